//! Standardized error handling for the satsend engine
//!
//! This module defines the error hierarchy surfaced by the preparation and
//! broadcast pipeline. Provider-level failures ([`ProviderError`]) are always
//! absorbed by the failover loop and only resurface as the list of
//! [`ProviderAttempt`]s attached to an exhaustion error.
//!
//! # Usage
//!
//! ```
//! use satsend_core::error::{EngineError, ErrorCategory};
//!
//! let err = EngineError::invalid_input("amount must be positive");
//! assert_eq!(err.category(), ErrorCategory::InvalidInput);
//! ```

use std::fmt;
use thiserror::Error;

use crate::amount::format_btc;

/// Failure of a single provider attempt
///
/// These never reach the caller directly: the provider loop records them and
/// moves on to the next provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("timed out after {0} ms")]
    Timeout(u64),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no unspent outputs returned")]
    Empty,
}

impl ProviderError {
    /// Map a reqwest failure onto the provider taxonomy
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(timeout_ms)
        } else if err.is_decode() {
            ProviderError::Malformed(err.to_string())
        } else {
            ProviderError::Request(err.to_string())
        }
    }
}

/// A failed attempt against one named provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderAttempt {
    pub provider: String,
    pub error: ProviderError,
}

impl fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider, self.error)
    }
}

fn join_attempts(attempts: &[ProviderAttempt]) -> String {
    if attempts.is_empty() {
        return "no providers configured".to_string();
    }
    attempts
        .iter()
        .map(ProviderAttempt::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors reported by the external signer
#[derive(Debug, Error)]
pub enum SignerError {
    #[error("signing rejected: {0}")]
    Rejected(String),

    #[error("signer unavailable: {0}")]
    Unavailable(String),
}

/// The main error type for the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed address, amount or transaction supplied by the caller
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The address has no known unspent outputs
    #[error("No unspent outputs found for address")]
    NoFunds,

    /// Known outputs cannot cover the payment plus fee
    #[error("Insufficient funds: short by {} BTC (available {available_sats} sats, required {required_sats} sats)", format_btc(*shortfall_sats))]
    InsufficientFunds {
        shortfall_sats: u64,
        available_sats: u64,
        required_sats: u64,
    },

    /// Every UTXO provider failed; distinct from an empty balance
    #[error("All UTXO providers failed: {}", join_attempts(attempts))]
    UtxoLookupFailed { attempts: Vec<ProviderAttempt> },

    /// Every broadcast provider rejected the transaction
    #[error("All broadcast endpoints failed, no funds were moved: {}", join_attempts(attempts))]
    BroadcastFailure { attempts: Vec<ProviderAttempt> },

    /// The external signer could not produce a signed transaction
    #[error("Signer error: {0}")]
    Signer(#[from] SignerError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Type alias for a Result with EngineError
pub type EngineResult<T> = Result<T, EngineError>;

/// Error category for logging purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidInput,
    Funds,
    Network,
    Signer,
    Config,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::InvalidInput => "InvalidInput",
            ErrorCategory::Funds => "Funds",
            ErrorCategory::Network => "Network",
            ErrorCategory::Signer => "Signer",
            ErrorCategory::Config => "Config",
        }
    }
}

impl EngineError {
    /// Create a new invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        EngineError::InvalidInput(message.into())
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        EngineError::Config(message.into())
    }

    /// Get the category of this error for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::InvalidInput(_) => ErrorCategory::InvalidInput,
            EngineError::NoFunds | EngineError::InsufficientFunds { .. } => ErrorCategory::Funds,
            EngineError::UtxoLookupFailed { .. } | EngineError::BroadcastFailure { .. } => {
                ErrorCategory::Network
            }
            EngineError::Signer(_) => ErrorCategory::Signer,
            EngineError::Config(_) => ErrorCategory::Config,
        }
    }

    /// Whether retrying the same request later could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::UtxoLookupFailed { .. } | EngineError::BroadcastFailure { .. }
        )
    }

    /// Get a short message suitable for displaying to users
    ///
    /// Provider response bodies are left out; they are available through the
    /// `Display` implementation for logs.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::InvalidInput(msg) => format!("Invalid input: {}", msg),
            EngineError::NoFunds => "No spendable funds were found for this address".to_string(),
            EngineError::InsufficientFunds { shortfall_sats, .. } => {
                format!("Insufficient funds: you need {} BTC more", format_btc(*shortfall_sats))
            }
            EngineError::UtxoLookupFailed { .. } => {
                "Could not reach any chain-data provider to look up funds".to_string()
            }
            EngineError::BroadcastFailure { .. } => {
                "Transaction failed. No funds were sent.".to_string()
            }
            EngineError::Signer(_) => "The transaction could not be signed".to_string(),
            EngineError::Config(msg) => format!("Configuration error: {}", msg),
        }
    }
}
