//! Bitcoin amount conversions
//!
//! Callers hand the engine decimal BTC strings, while every internal
//! computation is done in whole satoshis. Conversions go through
//! `rust_decimal` so no float rounding leaks into monetary values.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;

use crate::error::EngineError;
use crate::types::{MAX_BITCOIN_SUPPLY, SATS_PER_BTC};

/// Parse a decimal BTC amount into satoshis, flooring sub-satoshi digits
///
/// # Examples
///
/// ```
/// use satsend_core::amount::btc_to_sats;
///
/// assert_eq!(btc_to_sats("0.0006").unwrap(), 60_000);
/// assert_eq!(btc_to_sats(" 1.5 ").unwrap(), 150_000_000);
/// assert!(btc_to_sats("0").is_err());
/// ```
pub fn btc_to_sats(amount_btc: &str) -> Result<u64, EngineError> {
    let trimmed = amount_btc.trim();
    if trimmed.is_empty() {
        return Err(EngineError::invalid_input("empty amount"));
    }

    let btc = Decimal::from_str(trimmed)
        .map_err(|e| EngineError::invalid_input(format!("could not parse amount '{}': {}", trimmed, e)))?;

    if btc <= dec!(0) {
        return Err(EngineError::invalid_input(format!("amount must be positive, got {}", btc)));
    }

    let sats = btc
        .checked_mul(Decimal::from(SATS_PER_BTC))
        .and_then(|sats| sats.floor().to_u64())
        .ok_or_else(|| EngineError::invalid_input(format!("amount out of range: {}", btc)))?;

    if sats == 0 {
        return Err(EngineError::invalid_input("amount is smaller than one satoshi"));
    }
    if sats > MAX_BITCOIN_SUPPLY {
        return Err(EngineError::invalid_input("amount exceeds maximum Bitcoin supply"));
    }

    Ok(sats)
}

/// Convert satoshis to an exact BTC decimal with 8 fractional digits
pub fn sats_to_btc(sats: u64) -> Decimal {
    Decimal::from_i128_with_scale(i128::from(sats), 8)
}

/// Format satoshis as whole coins, always with 8 decimals (`0.00004000`)
pub fn format_btc(sats: u64) -> String {
    sats_to_btc(sats).to_string()
}
