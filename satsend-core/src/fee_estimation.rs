//! Fee-rate estimation with provider failover
//!
//! Providers are asked in priority order and the first sane value wins.
//! The estimator never fails: when every provider is unreachable or returns
//! nonsense, it falls back to a fixed rate chosen by [`FeePolicy`].
//!
//! # Response shapes
//!
//! - `FastestFee`: mempool.space `/v1/fees/recommended`, `{ "fastestFee": 21, ... }`
//! - `TargetMap`: Esplora `/fee-estimates`, `{ "1": 87.8, "6": 40.1, ... }`; the
//!   highest rate is used
//! - `PerKb`: BlockCypher chain info, `{ "high_fee_per_kb": 25000, ... }`;
//!   divided by 1000 and rounded up

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::provider::{first_success, HttpClient, Provider, ProviderSet};
use crate::types::{FeeRate, MAX_REASONABLE_FEE_RATE};

/// Response shapes understood by the fee normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeShape {
    FastestFee,
    TargetMap,
    PerKb,
}

pub type FeeProvider = Provider<FeeShape>;

/// Selects the fallback rate used when no provider answers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeePolicy {
    /// Only confirmed inputs will be spent
    ConfirmedOnly,
    /// Unconfirmed inputs may be spent, so the fallback must clear the unconfirmed floor
    AllowUnconfirmed,
}

impl Default for FeePolicy {
    fn default() -> Self {
        FeePolicy::ConfirmedOnly
    }
}

/// Validate a provider rate against sane bounds
fn checked_rate(rate: f64) -> Result<FeeRate, ProviderError> {
    if rate > MAX_REASONABLE_FEE_RATE {
        log::warn!(
            "Fee rate {} sat/vB exceeds maximum reasonable rate {}, ignoring",
            rate,
            MAX_REASONABLE_FEE_RATE
        );
        return Err(ProviderError::Malformed(format!("outlier fee rate {}", rate)));
    }
    FeeRate::from_sat_per_vb(rate)
        .ok_or_else(|| ProviderError::Malformed(format!("invalid fee rate {}", rate)))
}

/// Normalize one provider response into a fee rate
pub fn parse_fee_response(shape: FeeShape, body: &Value) -> Result<FeeRate, ProviderError> {
    let field = |name: &str| {
        body.get(name)
            .and_then(Value::as_f64)
            .ok_or_else(|| ProviderError::Malformed(format!("missing numeric field '{}'", name)))
    };

    match shape {
        FeeShape::FastestFee => checked_rate(field("fastestFee")?),
        FeeShape::TargetMap => {
            let map = body
                .as_object()
                .ok_or_else(|| ProviderError::Malformed("expected fee-estimates object".to_string()))?;
            let highest = map
                .values()
                .filter_map(Value::as_f64)
                .fold(None, |acc: Option<f64>, rate| Some(acc.map_or(rate, |a| a.max(rate))))
                .ok_or_else(|| ProviderError::Malformed("empty fee-estimates map".to_string()))?;
            checked_rate(highest)
        }
        FeeShape::PerKb => checked_rate((field("high_fee_per_kb")? / 1000.0).ceil()),
    }
}

/// Estimates the current fee rate from the first provider that answers sanely
#[derive(Debug, Clone)]
pub struct FeeEstimator {
    providers: ProviderSet<FeeShape>,
    http: HttpClient,
    confirmed_fallback: FeeRate,
    unconfirmed_fallback: FeeRate,
}

impl FeeEstimator {
    pub fn new(providers: ProviderSet<FeeShape>, http: HttpClient) -> Self {
        Self {
            providers,
            http,
            confirmed_fallback: FeeRate::DEFAULT,
            unconfirmed_fallback: FeeRate::UNCONFIRMED_MIN,
        }
    }

    /// Override the fallback rates used for each policy
    pub fn with_fallback_rates(mut self, confirmed: FeeRate, unconfirmed: FeeRate) -> Self {
        self.confirmed_fallback = confirmed;
        self.unconfirmed_fallback = unconfirmed;
        self
    }

    pub fn fallback_rate(&self, policy: FeePolicy) -> FeeRate {
        match policy {
            FeePolicy::ConfirmedOnly => self.confirmed_fallback,
            FeePolicy::AllowUnconfirmed => self.unconfirmed_fallback,
        }
    }

    /// Current fee rate, or the policy fallback when no provider answers
    pub async fn estimate(&self, policy: FeePolicy) -> FeeRate {
        match self.query_providers().await {
            Some(rate) => rate,
            None => self.fallback_for(policy),
        }
    }

    /// First sane provider rate, without falling back
    pub async fn query_providers(&self) -> Option<FeeRate> {
        let result = first_success(&self.providers, "fee estimation", |provider| async move {
            let body = self.http.get_json(&provider.endpoint).await?;
            parse_fee_response(provider.shape, &body)
        })
        .await;

        match result {
            Ok(answer) => {
                log::info!("Fee rate {} from {}", answer.value, answer.provider.name);
                Some(answer.value)
            }
            Err(_) => None,
        }
    }

    /// Fallback rate for `policy`, logged as such
    pub fn fallback_for(&self, policy: FeePolicy) -> FeeRate {
        let fallback = self.fallback_rate(policy);
        log::warn!("No fee provider answered, using fallback {} ({:?})", fallback, policy);
        fallback
    }
}
