//! Common data types for the satsend engine
//!
//! These are value objects owned by a single `prepare → sign → broadcast`
//! invocation. None of them carry key material.

use serde::{Deserialize, Serialize};
use std::fmt;

// Constants for Bitcoin-specific values

/// Constant for satoshis per Bitcoin
pub const SATS_PER_BTC: u64 = 100_000_000;

/// Constant for maximum Bitcoin supply in satoshis
pub const MAX_BITCOIN_SUPPLY: u64 = 21_000_000 * SATS_PER_BTC;

/// Flat virtual size used by the compatibility fee model (one-in/one-out P2PKH)
pub const FLAT_TX_VBYTES: u64 = 180;

/// Margin over the target at which greedy accumulation stops
pub const EARLY_STOP_MARGIN_SATS: u64 = 1_000;

/// Leftover value at or below this is folded into the fee instead of creating change
pub const CHANGE_THRESHOLD_SATS: u64 = 5_000;

/// Minimum fee rate once an unconfirmed input is spent (sat/vB)
pub const UNCONFIRMED_MIN_FEE_RATE: f64 = 50.0;

/// Fallback fee rate for confirmed-only flows (sat/vB)
pub const DEFAULT_FEE_RATE: f64 = 20.0;

/// Provider fee rates above this are treated as outliers (sat/vB)
pub const MAX_REASONABLE_FEE_RATE: f64 = 2_000.0;

/// Whether an output's originating transaction is in a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    Confirmed,
    Unconfirmed,
}

impl ConfirmationStatus {
    pub fn from_confirmed(confirmed: bool) -> Self {
        if confirmed {
            ConfirmationStatus::Confirmed
        } else {
            ConfirmationStatus::Unconfirmed
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, ConfirmationStatus::Confirmed)
    }
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationStatus::Confirmed => write!(f, "confirmed"),
            ConfirmationStatus::Unconfirmed => write!(f, "unconfirmed"),
        }
    }
}

/// A spendable output, normalized from any provider's response shape
///
/// Identity is `(transaction_id, output_index)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    /// Originating transaction id, 64 lowercase hex characters
    pub transaction_id: String,
    pub output_index: u32,
    pub value_sats: u64,
    pub confirmation_status: ConfirmationStatus,
}

impl UnspentOutput {
    pub fn new(
        transaction_id: impl Into<String>,
        output_index: u32,
        value_sats: u64,
        confirmation_status: ConfirmationStatus,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            output_index,
            value_sats,
            confirmation_status,
        }
    }

    /// Shorthand for a confirmed output
    pub fn confirmed(transaction_id: impl Into<String>, output_index: u32, value_sats: u64) -> Self {
        Self::new(transaction_id, output_index, value_sats, ConfirmationStatus::Confirmed)
    }

    /// Shorthand for an unconfirmed output
    pub fn unconfirmed(transaction_id: impl Into<String>, output_index: u32, value_sats: u64) -> Self {
        Self::new(transaction_id, output_index, value_sats, ConfirmationStatus::Unconfirmed)
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmation_status.is_confirmed()
    }

    /// `txid:vout` key identifying this output
    pub fn outpoint_key(&self) -> String {
        format!("{}:{}", self.transaction_id, self.output_index)
    }
}

/// Fee rate in satoshis per virtual byte
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct FeeRate(f64);

impl FeeRate {
    /// Fallback rate when only confirmed inputs are spent
    pub const DEFAULT: FeeRate = FeeRate(DEFAULT_FEE_RATE);

    /// Floor applied once an unconfirmed input is spent
    pub const UNCONFIRMED_MIN: FeeRate = FeeRate(UNCONFIRMED_MIN_FEE_RATE);

    /// Build a fee rate; `None` for non-finite or non-positive values
    pub fn from_sat_per_vb(rate: f64) -> Option<Self> {
        if rate.is_finite() && rate > 0.0 {
            Some(Self(rate))
        } else {
            None
        }
    }

    pub fn sat_per_vb(&self) -> f64 {
        self.0
    }

    /// Raise the rate to at least `floor` sat/vB
    pub fn at_least(self, floor: f64) -> Self {
        Self(self.0.max(floor))
    }

    /// Fee in whole satoshis for `vbytes`, rounded down
    pub fn fee_for_vbytes(&self, vbytes: u64) -> u64 {
        (vbytes as f64 * self.0).floor() as u64
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat/vB", self.0)
    }
}

/// Check that a string is a 64-character hex transaction id
pub fn is_valid_txid_hex(txid: &str) -> bool {
    txid.len() == 64 && txid.chars().all(|c| c.is_ascii_hexdigit())
}
