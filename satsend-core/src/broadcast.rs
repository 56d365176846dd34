//! Signed-transaction broadcast with provider failover
//!
//! The signed bytes are decoded locally before any network call, both to
//! reject garbage early and to know the transaction id independently of what
//! a provider answers. Providers are tried in order and the first 2xx answer
//! ends the loop; later providers are never contacted.

use bitcoin::consensus::encode;
use bitcoin::Transaction;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{EngineError, EngineResult, ProviderError};
use crate::logging::{self, sanitize_for_logging, LogLevel};
use crate::provider::{first_success, HttpClient, Provider, ProviderSet};
use crate::types::is_valid_txid_hex;

/// Request body formats accepted by broadcast endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastShape {
    /// Raw hex as a `text/plain` body (Esplora)
    RawHex,
    /// `{"tx": "<hex>"}` (BlockCypher push)
    JsonTx,
    /// `{"hex": "<hex>"}`
    JsonHex,
}

pub type BroadcastProvider = Provider<BroadcastShape>;

/// Outcome of a successful broadcast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub transaction_id: String,
    /// Name of the provider that accepted the transaction
    pub provider: String,
}

/// Pull a transaction id out of a provider response body
///
/// Accepts a bare id, a JSON string, or an object with `txid`, `hash` or
/// `tx.hash`. Anything that is not a 64-character hex id yields `None`.
pub fn extract_txid(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if is_valid_txid_hex(trimmed) {
        return Some(trimmed.to_ascii_lowercase());
    }

    let candidate = match serde_json::from_str::<Value>(trimmed).ok()? {
        Value::String(s) => Some(s),
        Value::Object(map) => map
            .get("txid")
            .or_else(|| map.get("hash"))
            .or_else(|| map.get("tx").and_then(|tx| tx.get("hash")))
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }?;

    let candidate = candidate.trim();
    if is_valid_txid_hex(candidate) {
        Some(candidate.to_ascii_lowercase())
    } else {
        None
    }
}

/// Decode signed bytes and compute their transaction id
pub fn local_txid(signed_bytes: &[u8]) -> EngineResult<String> {
    let tx: Transaction = encode::deserialize(signed_bytes)
        .map_err(|e| EngineError::invalid_input(format!("signed transaction does not decode: {}", e)))?;
    Ok(tx.txid().to_string())
}

/// Submits signed transactions to the first provider that accepts them
#[derive(Debug, Clone)]
pub struct Broadcaster {
    providers: ProviderSet<BroadcastShape>,
    http: HttpClient,
}

impl Broadcaster {
    pub fn new(providers: ProviderSet<BroadcastShape>, http: HttpClient) -> Self {
        Self { providers, http }
    }

    pub fn providers(&self) -> &ProviderSet<BroadcastShape> {
        &self.providers
    }

    /// Broadcast signed wire bytes
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the bytes are not a transaction; nothing is sent
    /// - `BroadcastFailure` listing every provider's failure
    pub async fn broadcast(&self, signed_bytes: &[u8]) -> EngineResult<BroadcastResult> {
        let local_id = local_txid(signed_bytes)?;
        let tx_hex = hex::encode(signed_bytes);

        logging::log_transaction(
            LogLevel::Info,
            "Broadcasting transaction",
            Some(json!({
                "txid": sanitize_for_logging(&local_id),
                "size_bytes": signed_bytes.len(),
            })),
        );

        let result = first_success(&self.providers, "broadcast", |provider| {
            self.submit(provider, tx_hex.clone())
        })
        .await;

        match result {
            Ok(answer) => {
                let transaction_id = match extract_txid(&answer.value) {
                    Some(id) => {
                        if id != local_id {
                            log::warn!(
                                "{} reported txid {} but local txid is {}",
                                answer.provider.name,
                                sanitize_for_logging(&id),
                                sanitize_for_logging(&local_id)
                            );
                        }
                        id
                    }
                    None => local_id,
                };
                Ok(BroadcastResult {
                    transaction_id,
                    provider: answer.provider.name.clone(),
                })
            }
            Err(attempts) => {
                log::error!("All broadcast endpoints failed, no funds were moved");
                Err(EngineError::BroadcastFailure { attempts })
            }
        }
    }

    /// Broadcast a hex-encoded signed transaction
    pub async fn broadcast_hex(&self, tx_hex: &str) -> EngineResult<BroadcastResult> {
        let bytes = hex::decode(tx_hex.trim())
            .map_err(|e| EngineError::invalid_input(format!("transaction hex is invalid: {}", e)))?;
        self.broadcast(&bytes).await
    }

    async fn submit(&self, provider: &BroadcastProvider, tx_hex: String) -> Result<String, ProviderError> {
        match provider.shape {
            BroadcastShape::RawHex => self.http.post_text(&provider.endpoint, tx_hex).await,
            BroadcastShape::JsonTx => self.http.post_json(&provider.endpoint, &json!({ "tx": tx_hex })).await,
            BroadcastShape::JsonHex => self.http.post_json(&provider.endpoint, &json!({ "hex": tx_hex })).await,
        }
    }
}
