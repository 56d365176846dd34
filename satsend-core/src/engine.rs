//! Transaction preparation and broadcast pipeline
//!
//! [`TransactionEngine`] ties the components together:
//!
//! 1. validate addresses and amount (no network access on failure)
//! 2. fetch unspent outputs and estimate the fee rate concurrently
//! 3. select coins and build the unsigned template
//! 4. hand the template to a [`TransactionSigner`]
//! 5. broadcast the signed bytes
//!
//! The engine is read-only after construction and can be shared between
//! tasks.

use bitcoin::address::NetworkUnchecked;
use bitcoin::Address;
use serde_json::json;
use std::str::FromStr;

use crate::amount::btc_to_sats;
use crate::broadcast::{BroadcastResult, Broadcaster};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::fee_estimation::{FeeEstimator, FeePolicy};
use crate::logging::{self, sanitize_for_logging, LogLevel};
use crate::network::{ChainNetwork, NetworkConfig};
use crate::provider::HttpClient;
use crate::selection::{CoinSelector, UnconfirmedPolicy};
use crate::signer::TransactionSigner;
use crate::template::{self, TransactionTemplate};
use crate::types::{FeeRate, UnspentOutput, MAX_BITCOIN_SUPPLY};
use crate::utxo::UtxoFetcher;

/// Prepares, hands off for signing, and broadcasts single-recipient payments
#[derive(Debug, Clone)]
pub struct TransactionEngine {
    network: NetworkConfig,
    utxo_fetcher: UtxoFetcher,
    fee_estimator: FeeEstimator,
    selector: CoinSelector,
    broadcaster: Broadcaster,
}

impl TransactionEngine {
    /// Build an engine from explicit provider sets and engine settings
    pub fn new(network: NetworkConfig, config: &EngineConfig) -> EngineResult<Self> {
        config
            .validate()
            .map_err(|e| EngineError::config(e.to_string()))?;
        let (confirmed_fallback, unconfirmed_fallback) = config
            .fallback_fee_rates()
            .map_err(|e| EngineError::config(e.to_string()))?;

        let http = HttpClient::new(network.request_timeout)?;

        log::info!(
            "Transaction engine on {} ({} utxo, {} fee, {} broadcast providers)",
            network.network,
            network.utxo.len(),
            network.fees.len(),
            network.broadcast.len()
        );

        Ok(Self {
            utxo_fetcher: UtxoFetcher::new(network.utxo.clone(), http.clone()),
            fee_estimator: FeeEstimator::new(network.fees.clone(), http.clone())
                .with_fallback_rates(confirmed_fallback, unconfirmed_fallback),
            selector: CoinSelector::new(config.selection_config()),
            broadcaster: Broadcaster::new(network.broadcast.clone(), http),
            network,
        })
    }

    /// Build an engine entirely from a config file's contents
    pub fn from_config(config: &EngineConfig) -> EngineResult<Self> {
        Self::new(config.network_config(), config)
    }

    /// Default public providers and settings for `network`
    pub fn with_defaults(network: ChainNetwork) -> EngineResult<Self> {
        Self::new(NetworkConfig::new(network), &EngineConfig::default())
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    pub fn utxo_fetcher(&self) -> &UtxoFetcher {
        &self.utxo_fetcher
    }

    pub fn fee_estimator(&self) -> &FeeEstimator {
        &self.fee_estimator
    }

    pub fn selector(&self) -> &CoinSelector {
        &self.selector
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Check that `address` parses and belongs to the configured chain
    pub fn validate_address(&self, address: &str) -> EngineResult<()> {
        let network = self.network.bitcoin_network();
        let unchecked = Address::<NetworkUnchecked>::from_str(address.trim())
            .map_err(|e| EngineError::invalid_input(format!("invalid address '{}': {}", address, e)))?;

        if !unchecked.is_valid_for_network(network) {
            return Err(EngineError::invalid_input(format!(
                "address '{}' is not valid for {}",
                address, self.network.network
            )));
        }
        Ok(())
    }

    /// Prepare an unsigned template paying `amount_sats` to `recipient`
    ///
    /// With `fee_override` set, no fee provider is contacted.
    pub async fn prepare(
        &self,
        sender: &str,
        recipient: &str,
        amount_sats: u64,
        fee_override: Option<FeeRate>,
    ) -> EngineResult<TransactionTemplate> {
        self.validate_address(sender)?;
        self.validate_address(recipient)?;
        if amount_sats == 0 {
            return Err(EngineError::invalid_input("payment amount must be positive"));
        }
        if amount_sats > MAX_BITCOIN_SUPPLY {
            return Err(EngineError::invalid_input("amount exceeds maximum Bitcoin supply"));
        }

        let sender = sender.trim();
        let recipient = recipient.trim();

        logging::log_transaction(
            LogLevel::Info,
            "Preparing transaction",
            Some(json!({
                "sender": sanitize_for_logging(sender),
                "recipient": sanitize_for_logging(recipient),
                "amount_sats": amount_sats,
            })),
        );

        let (utxos, provider_rate) = match fee_override {
            Some(rate) => (self.utxo_fetcher.fetch(sender).await?, Some(rate)),
            None => {
                let (utxos, rate) =
                    tokio::join!(self.utxo_fetcher.fetch(sender), self.fee_estimator.query_providers());
                (utxos?, rate)
            }
        };

        if utxos.is_empty() {
            log::warn!("No UTXOs found for {}", sanitize_for_logging(sender));
            return Err(EngineError::NoFunds);
        }

        let fee_rate = match provider_rate {
            Some(rate) => rate,
            None => self.fee_estimator.fallback_for(self.fallback_policy(&utxos)),
        };

        let selection = self.selector.select(&utxos, amount_sats, fee_rate)?;
        let template = template::build(sender, recipient, amount_sats, &selection)?;

        logging::log_transaction(
            LogLevel::Info,
            "Transaction template ready",
            Some(json!({
                "inputs": template.inputs().len(),
                "outputs": template.outputs().len(),
                "fee_rate": template.fee_rate().sat_per_vb(),
                "fee_sats": template.fee_sats(),
                "uses_unconfirmed_input": template.uses_unconfirmed_input(),
            })),
        );

        Ok(template)
    }

    /// [`TransactionEngine::prepare`] with a decimal BTC amount such as `"0.0006"`
    pub async fn prepare_btc(
        &self,
        sender: &str,
        recipient: &str,
        amount_btc: &str,
        fee_override: Option<FeeRate>,
    ) -> EngineResult<TransactionTemplate> {
        let amount_sats = btc_to_sats(amount_btc)?;
        self.prepare(sender, recipient, amount_sats, fee_override).await
    }

    /// Broadcast signed wire bytes
    pub async fn broadcast(&self, signed_bytes: &[u8]) -> EngineResult<BroadcastResult> {
        self.broadcaster.broadcast(signed_bytes).await
    }

    /// Broadcast a hex-encoded signed transaction
    pub async fn broadcast_hex(&self, tx_hex: &str) -> EngineResult<BroadcastResult> {
        self.broadcaster.broadcast_hex(tx_hex).await
    }

    /// Prepare, sign with `signer`, and broadcast
    ///
    /// A signer failure aborts before anything is broadcast.
    pub async fn send<S: TransactionSigner>(
        &self,
        signer: &S,
        sender: &str,
        recipient: &str,
        amount_sats: u64,
        fee_override: Option<FeeRate>,
    ) -> EngineResult<BroadcastResult> {
        let template = self.prepare(sender, recipient, amount_sats, fee_override).await?;

        let signed = signer.sign(&template).await.map_err(|e| {
            log::error!("Signer failed, nothing was broadcast: {}", e);
            EngineError::from(e)
        })?;

        let result = self.broadcast(&signed).await?;
        logging::log_transaction(
            LogLevel::Info,
            "Transaction sent",
            Some(json!({
                "txid": sanitize_for_logging(&result.transaction_id),
                "provider": result.provider,
            })),
        );
        Ok(result)
    }

    // Unconfirmed funds may end up spent, so the fallback must clear their floor
    fn fallback_policy(&self, utxos: &[UnspentOutput]) -> FeePolicy {
        let may_spend_unconfirmed = self.selector.config().unconfirmed_policy == UnconfirmedPolicy::Allow
            && utxos.iter().any(|u| !u.is_confirmed());
        if may_spend_unconfirmed {
            FeePolicy::AllowUnconfirmed
        } else {
            FeePolicy::ConfirmedOnly
        }
    }
}
