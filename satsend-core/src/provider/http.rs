//! Thin reqwest wrapper applying the per-attempt timeout
//!
//! The timeout is set on each request, so a slow provider's future is dropped
//! (and its connection closed) before the next provider is tried.

use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::time::Duration;

use crate::error::{EngineError, ProviderError};

/// Longest response body kept in a `ProviderError::Status`
const MAX_ERROR_BODY_CHARS: usize = 256;

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("satsend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EngineError::config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// GET a URL and parse the body as JSON
    pub async fn get_json(&self, url: &str) -> Result<Value, ProviderError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout_ms()))?;

        let body = self.read_success_body(response).await?;
        serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(e.to_string()))
    }

    /// POST a raw hex transaction as `text/plain`
    pub async fn post_text(&self, url: &str, body: String) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout_ms()))?;

        self.read_success_body(response).await
    }

    /// POST a JSON document
    pub async fn post_json(&self, url: &str, body: &Value) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout_ms()))?;

        self.read_success_body(response).await
    }

    async fn read_success_body(&self, response: reqwest::Response) -> Result<String, ProviderError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(e, self.timeout_ms()))?;

        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        Ok(body)
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut short: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    short.push_str("...");
    short
}
