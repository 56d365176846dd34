//! Redundant remote data sources and the failover loop shared by every
//! capability (UTXO lookup, fee estimation, broadcast)
//!
//! A [`Provider`] is a capability record `{ name, endpoint, shape }`; the
//! shape is a closed enum picked per capability that selects the request
//! and response normalizer. Providers are tried strictly in order and any
//! failure means "try the next one".

pub mod http;

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::Future;

use crate::error::{ProviderAttempt, ProviderError};
use crate::logging::{self, LogLevel};

pub use http::HttpClient;

/// One remote endpoint able to serve a capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider<S> {
    /// Human-readable name used in logs and attempt reports
    pub name: String,
    /// URL; UTXO endpoints carry an `{address}` placeholder
    pub endpoint: String,
    pub shape: S,
}

impl<S> Provider<S> {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, shape: S) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            shape,
        }
    }
}

/// Ordered, read-only list of providers for one capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderSet<S> {
    providers: Vec<Provider<S>>,
}

impl<S> ProviderSet<S> {
    pub fn new(providers: Vec<Provider<S>>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &[Provider<S>] {
        &self.providers
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name.as_str()).collect()
    }
}

impl<S> From<Vec<Provider<S>>> for ProviderSet<S> {
    fn from(providers: Vec<Provider<S>>) -> Self {
        Self::new(providers)
    }
}

/// Successful answer from the failover loop
#[derive(Debug)]
pub struct Answer<'a, S, T> {
    pub provider: &'a Provider<S>,
    pub value: T,
    /// Failures recorded before this provider answered
    pub attempts: Vec<ProviderAttempt>,
}

/// Try each provider in order until `attempt` succeeds
///
/// Every failure is logged and recorded. Returns the first success, or the
/// full list of attempts once the set is exhausted. No provider after the
/// first success is contacted.
pub async fn first_success<'a, S, T, F, Fut>(
    set: &'a ProviderSet<S>,
    capability: &str,
    mut attempt: F,
) -> Result<Answer<'a, S, T>, Vec<ProviderAttempt>>
where
    F: FnMut(&'a Provider<S>) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempts = Vec::with_capacity(set.len());

    for provider in set.providers() {
        log::debug!("{}: trying provider {}", capability, provider.name);

        match attempt(provider).await {
            Ok(value) => {
                logging::log_network(
                    LogLevel::Info,
                    &format!("{} served by {}", capability, provider.name),
                    Some(json!({ "failed_before": attempts.len() })),
                );
                return Ok(Answer {
                    provider,
                    value,
                    attempts,
                });
            }
            Err(error) => {
                logging::log_network(
                    LogLevel::Warn,
                    &format!("{} failed at {}", capability, provider.name),
                    Some(json!({ "error": error.to_string() })),
                );
                attempts.push(ProviderAttempt {
                    provider: provider.name.clone(),
                    error,
                });
            }
        }
    }

    log::warn!("{}: all {} providers failed", capability, set.len());
    Err(attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn set() -> ProviderSet<()> {
        ProviderSet::new(vec![
            Provider::new("first", "http://first", ()),
            Provider::new("second", "http://second", ()),
            Provider::new("third", "http://third", ()),
        ])
    }

    #[tokio::test]
    async fn test_stops_at_first_success() {
        let set = set();
        let contacted = RefCell::new(Vec::new());

        let answer = first_success(&set, "test", |p| {
            contacted.borrow_mut().push(p.name.clone());
            let name = p.name.clone();
            async move {
                if name == "first" {
                    Err(ProviderError::Timeout(10))
                } else {
                    Ok(name)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(answer.value, "second");
        assert_eq!(answer.provider.name, "second");
        assert_eq!(answer.attempts.len(), 1);
        assert_eq!(*contacted.borrow(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_exhaustion_records_every_attempt() {
        let set = set();
        let attempts = first_success(&set, "test", |_| async {
            Err::<(), _>(ProviderError::Request("refused".into()))
        })
        .await
        .unwrap_err();

        let names: Vec<_> = attempts.iter().map(|a| a.provider.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_empty_set_yields_no_attempts() {
        let set: ProviderSet<()> = ProviderSet::new(vec![]);
        let attempts = first_success(&set, "test", |_| async { Ok::<_, ProviderError>(()) })
            .await
            .unwrap_err();
        assert!(attempts.is_empty());
    }
}
