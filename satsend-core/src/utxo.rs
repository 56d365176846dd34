//! Unspent-output retrieval with provider failover
//!
//! The fetcher walks the UTXO provider set in order and returns the first
//! non-empty answer, normalized to [`UnspentOutput`]. Results are never
//! merged across providers.
//!
//! Empty answers are remembered: when every provider fails and at least one
//! of them answered with an empty list, the address is reported as having no
//! funds. Only when no provider produced a usable answer at all does the
//! fetch fail with [`EngineError::UtxoLookupFailed`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{EngineError, EngineResult, ProviderError};
use crate::logging::sanitize_for_logging;
use crate::provider::{first_success, HttpClient, Provider, ProviderSet};
use crate::types::{is_valid_txid_hex, ConfirmationStatus, UnspentOutput};

/// Placeholder substituted with the queried address in UTXO endpoints
pub const ADDRESS_PLACEHOLDER: &str = "{address}";

/// Response shapes understood by the UTXO normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UtxoShape {
    /// Esplora array: `[{ txid, vout, value, status: { confirmed } }]`
    Esplora,
    /// BlockCypher address object with `txrefs` / `unconfirmed_txrefs`
    BlockCypher,
    /// blockchain.info `{ unspent_outputs: [...] }`
    BlockchainInfo,
}

pub type UtxoProvider = Provider<UtxoShape>;

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    value: u64,
    #[serde(default)]
    status: Option<EsploraStatus>,
}

#[derive(Debug, Deserialize)]
struct EsploraStatus {
    #[serde(default)]
    confirmed: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct BlockCypherAddress {
    #[serde(default)]
    txrefs: Vec<BlockCypherTxRef>,
    #[serde(default)]
    unconfirmed_txrefs: Vec<BlockCypherTxRef>,
}

#[derive(Debug, Deserialize)]
struct BlockCypherTxRef {
    tx_hash: String,
    tx_output_n: i64,
    value: u64,
    #[serde(default)]
    confirmations: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BlockchainInfoUnspent {
    unspent_outputs: Vec<BlockchainInfoOutput>,
}

#[derive(Debug, Deserialize)]
struct BlockchainInfoOutput {
    tx_hash_big_endian: String,
    tx_output_n: u32,
    value: u64,
    #[serde(default)]
    confirmations: Option<u64>,
}

fn confirmations_status(confirmations: Option<u64>) -> ConfirmationStatus {
    // Missing means confirmed
    ConfirmationStatus::from_confirmed(confirmations.map_or(true, |c| c > 0))
}

fn output(
    txid: &str,
    vout: u32,
    value: u64,
    status: ConfirmationStatus,
) -> Result<UnspentOutput, ProviderError> {
    if !is_valid_txid_hex(txid) {
        return Err(ProviderError::Malformed(format!("invalid txid '{}'", txid)));
    }
    Ok(UnspentOutput::new(txid.to_ascii_lowercase(), vout, value, status))
}

/// Normalize one provider response into unspent outputs
///
/// Zero-value entries are skipped and duplicate outpoints keep their first
/// occurrence. A structurally wrong document is `Malformed`.
pub fn parse_utxo_response(shape: UtxoShape, body: Value) -> Result<Vec<UnspentOutput>, ProviderError> {
    let malformed = |e: serde_json::Error| ProviderError::Malformed(e.to_string());

    let outputs = match shape {
        UtxoShape::Esplora => {
            let entries: Vec<EsploraUtxo> = serde_json::from_value(body).map_err(malformed)?;
            entries
                .iter()
                .map(|u| {
                    let confirmed = u.status.as_ref().and_then(|s| s.confirmed).unwrap_or(true);
                    output(&u.txid, u.vout, u.value, ConfirmationStatus::from_confirmed(confirmed))
                })
                .collect::<Result<Vec<_>, _>>()?
        }
        UtxoShape::BlockCypher => {
            let address: BlockCypherAddress = serde_json::from_value(body).map_err(malformed)?;
            let confirmed = address
                .txrefs
                .iter()
                .map(|r| (r, confirmations_status(r.confirmations)));
            let unconfirmed = address
                .unconfirmed_txrefs
                .iter()
                .map(|r| (r, ConfirmationStatus::Unconfirmed));

            confirmed
                .chain(unconfirmed)
                // negative output numbers mark spending inputs
                .filter(|(r, _)| r.tx_output_n >= 0)
                .map(|(r, status)| {
                    let vout = u32::try_from(r.tx_output_n)
                        .map_err(|_| ProviderError::Malformed(format!("output index {}", r.tx_output_n)))?;
                    output(&r.tx_hash, vout, r.value, status)
                })
                .collect::<Result<Vec<_>, _>>()?
        }
        UtxoShape::BlockchainInfo => {
            let unspent: BlockchainInfoUnspent = serde_json::from_value(body).map_err(malformed)?;
            unspent
                .unspent_outputs
                .iter()
                .map(|u| {
                    output(
                        &u.tx_hash_big_endian,
                        u.tx_output_n,
                        u.value,
                        confirmations_status(u.confirmations),
                    )
                })
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    let mut seen = HashSet::new();
    Ok(outputs
        .into_iter()
        .filter(|u| u.value_sats > 0)
        .filter(|u| seen.insert((u.transaction_id.clone(), u.output_index)))
        .collect())
}

/// Fetches unspent outputs for an address from the first provider that has some
#[derive(Debug, Clone)]
pub struct UtxoFetcher {
    providers: ProviderSet<UtxoShape>,
    http: HttpClient,
}

impl UtxoFetcher {
    pub fn new(providers: ProviderSet<UtxoShape>, http: HttpClient) -> Self {
        Self { providers, http }
    }

    pub fn providers(&self) -> &ProviderSet<UtxoShape> {
        &self.providers
    }

    /// Fetch unspent outputs for `address`
    ///
    /// The address is passed through untouched. Returns an empty list when
    /// providers agree the address is unfunded, and `UtxoLookupFailed` when
    /// none of them could answer.
    pub async fn fetch(&self, address: &str) -> EngineResult<Vec<UnspentOutput>> {
        log::debug!("Fetching UTXOs for {}", sanitize_for_logging(address));

        let result = first_success(&self.providers, "utxo lookup", |provider| {
            self.fetch_from(provider, address)
        })
        .await;

        match result {
            Ok(answer) => {
                log::info!(
                    "Found {} UTXOs for {} via {}",
                    answer.value.len(),
                    sanitize_for_logging(address),
                    answer.provider.name
                );
                Ok(answer.value)
            }
            Err(attempts) => {
                if attempts.iter().any(|a| a.error == ProviderError::Empty) {
                    log::info!("No UTXOs found for {}", sanitize_for_logging(address));
                    Ok(Vec::new())
                } else {
                    Err(EngineError::UtxoLookupFailed { attempts })
                }
            }
        }
    }

    async fn fetch_from(
        &self,
        provider: &UtxoProvider,
        address: &str,
    ) -> Result<Vec<UnspentOutput>, ProviderError> {
        let url = provider.endpoint.replace(ADDRESS_PLACEHOLDER, address);
        let body = self.http.get_json(&url).await?;
        let outputs = parse_utxo_response(provider.shape, body)?;

        if outputs.is_empty() {
            return Err(ProviderError::Empty);
        }
        Ok(outputs)
    }
}
