//! Satsend Core Library
//!
//! Preparation, funding and broadcast engine for single-recipient Bitcoin
//! payments. The engine fetches unspent outputs and fee rates from redundant
//! public providers, selects coins, builds an unsigned template for an
//! external signer, and broadcasts the signed result.
//!
//! # Modules
//!
//! - `types`: Core value types and Bitcoin constants
//! - `amount`: Exact BTC/satoshi conversion
//! - `error`: Error hierarchy
//! - `logging`: Logging infrastructure
//! - `config`: TOML configuration
//! - `network`: Chain selection and default provider sets
//! - `provider`: Provider records and the failover loop
//! - `utxo`: Unspent-output retrieval
//! - `fee_estimation`: Fee-rate estimation
//! - `selection`: Coin selection and change computation
//! - `template`: Unsigned transaction templates
//! - `signer`: Signing boundary
//! - `broadcast`: Signed-transaction broadcast
//! - `engine`: The end-to-end pipeline
//!
//! # Key handling
//!
//! No key material ever enters this crate. Signing is delegated to a
//! [`TransactionSigner`] supplied by the caller.

/// Core value types and Bitcoin constants
pub mod types;

/// Exact BTC/satoshi conversion
pub mod amount;

/// Error hierarchy
pub mod error;

/// Logging infrastructure
pub mod logging;

/// Configuration management
pub mod config;

/// Chain selection and default provider sets
pub mod network;

/// Provider records and the failover loop
pub mod provider;

/// Unspent-output retrieval with failover
pub mod utxo;

/// Fee-rate estimation with failover
pub mod fee_estimation;

/// Coin selection and change computation
pub mod selection;

/// Unsigned transaction templates
pub mod template;

/// Signing boundary
pub mod signer;

/// Signed-transaction broadcast with failover
pub mod broadcast;

/// End-to-end pipeline
pub mod engine;

pub use broadcast::{BroadcastProvider, BroadcastResult, BroadcastShape, Broadcaster};
pub use config::EngineConfig;
pub use engine::TransactionEngine;
pub use error::{EngineError, EngineResult, ErrorCategory, ProviderAttempt, ProviderError, SignerError};
pub use fee_estimation::{FeeEstimator, FeePolicy, FeeProvider, FeeShape};
pub use network::{ChainNetwork, NetworkConfig};
pub use provider::{Provider, ProviderSet};
pub use selection::{CoinSelector, FeeModel, SelectionConfig, SelectionResult, UnconfirmedPolicy};
pub use signer::TransactionSigner;
pub use template::{TemplateOutput, TransactionTemplate};
pub use types::{ConfirmationStatus, FeeRate, UnspentOutput, MAX_BITCOIN_SUPPLY, SATS_PER_BTC};
pub use utxo::{UtxoFetcher, UtxoProvider, UtxoShape};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

use std::sync::Once;

// Ensure initialization happens only once
static INIT: Once = Once::new();

/// Library initialization
///
/// Installs the default logger. Safe to call multiple times.
pub fn init() -> Result<(), String> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = logging::init(&logging::LogConfig::default())
            .map_err(|e| format!("Failed to initialize logging: {}", e));
    });
    result
}
