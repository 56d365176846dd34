//! Deterministic coin selection and change computation
//!
//! The selector takes the largest outputs first and stops at the shortest
//! prefix that both clears the early-stop margin over the target and covers
//! the estimated fee. Spending any unconfirmed output raises the fee rate to
//! the unconfirmed floor. Leftover value above the change threshold becomes a
//! change output; anything at or below it is left to the miner.
//!
//! # Example
//!
//! ```
//! use satsend_core::selection::CoinSelector;
//! use satsend_core::types::{FeeRate, UnspentOutput};
//!
//! let utxos = vec![
//!     UnspentOutput::confirmed("aa".repeat(32), 0, 50_000),
//!     UnspentOutput::confirmed("bb".repeat(32), 1, 30_000),
//! ];
//! let rate = FeeRate::from_sat_per_vb(20.0).unwrap();
//!
//! let result = CoinSelector::default().select(&utxos, 60_000, rate).unwrap();
//! assert_eq!(result.change_value_sats, 16_400);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::types::{
    FeeRate, UnspentOutput, CHANGE_THRESHOLD_SATS, EARLY_STOP_MARGIN_SATS, FLAT_TX_VBYTES,
    UNCONFIRMED_MIN_FEE_RATE,
};

/// Fixed vbytes of a legacy transaction outside its inputs and outputs
const P2PKH_OVERHEAD_VBYTES: u64 = 10;
const P2PKH_INPUT_VBYTES: u64 = 148;
const P2PKH_OUTPUT_VBYTES: u64 = 34;

/// How the transaction size is approximated for fee purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeModel {
    /// 180 vbytes regardless of input count
    Flat,
    /// P2PKH sizing: `10 + 148 * inputs + 34 * 2`
    Estimated,
}

impl FeeModel {
    pub fn estimate_vbytes(&self, input_count: usize) -> u64 {
        match self {
            FeeModel::Flat => FLAT_TX_VBYTES,
            FeeModel::Estimated => {
                P2PKH_OVERHEAD_VBYTES + P2PKH_INPUT_VBYTES * input_count as u64 + P2PKH_OUTPUT_VBYTES * 2
            }
        }
    }
}

impl Default for FeeModel {
    fn default() -> Self {
        FeeModel::Flat
    }
}

/// Whether unconfirmed outputs may be spent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnconfirmedPolicy {
    Allow,
    Exclude,
}

impl Default for UnconfirmedPolicy {
    fn default() -> Self {
        UnconfirmedPolicy::Allow
    }
}

/// Tunables for [`CoinSelector`]
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    pub fee_model: FeeModel,
    pub unconfirmed_policy: UnconfirmedPolicy,
    /// Change at or below this is absorbed into the fee
    pub change_threshold_sats: u64,
    /// Accumulation stops once the target is exceeded by this much
    pub early_stop_margin_sats: u64,
    /// Minimum rate once an unconfirmed input is selected
    pub unconfirmed_min_fee_rate: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            fee_model: FeeModel::default(),
            unconfirmed_policy: UnconfirmedPolicy::default(),
            change_threshold_sats: CHANGE_THRESHOLD_SATS,
            early_stop_margin_sats: EARLY_STOP_MARGIN_SATS,
            unconfirmed_min_fee_rate: UNCONFIRMED_MIN_FEE_RATE,
        }
    }
}

/// Outcome of a successful selection
///
/// `sum(selected_inputs) >= target_value_sats + estimated_fee_sats` always
/// holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    pub selected_inputs: Vec<UnspentOutput>,
    /// Zero means no change output
    pub change_value_sats: u64,
    pub uses_unconfirmed_input: bool,
    pub effective_fee_rate: FeeRate,
    pub estimated_fee_sats: u64,
    pub target_value_sats: u64,
}

impl SelectionResult {
    pub fn total_selected_sats(&self) -> u64 {
        self.selected_inputs.iter().map(|u| u.value_sats).sum()
    }

    pub fn has_change(&self) -> bool {
        self.change_value_sats > 0
    }

    /// Fee actually paid, including any absorbed change
    pub fn actual_fee_sats(&self) -> u64 {
        self.total_selected_sats()
            .saturating_sub(self.target_value_sats)
            .saturating_sub(self.change_value_sats)
    }
}

/// Greedy largest-first coin selector
#[derive(Debug, Clone, Default)]
pub struct CoinSelector {
    config: SelectionConfig,
}

impl CoinSelector {
    pub fn new(config: SelectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    fn effective_rate(&self, requested: FeeRate, uses_unconfirmed: bool) -> FeeRate {
        if uses_unconfirmed {
            requested.at_least(self.config.unconfirmed_min_fee_rate)
        } else {
            requested
        }
    }

    /// Select inputs paying `target_sats` at `requested_rate`
    ///
    /// # Errors
    ///
    /// - `NoFunds` when `available` is empty
    /// - `InsufficientFunds` when the spendable outputs cannot cover the
    ///   target plus fee; no partial selection is ever returned
    /// - `InvalidInput` for a zero target
    pub fn select(
        &self,
        available: &[UnspentOutput],
        target_sats: u64,
        requested_rate: FeeRate,
    ) -> EngineResult<SelectionResult> {
        if available.is_empty() {
            return Err(EngineError::NoFunds);
        }
        if target_sats == 0 {
            return Err(EngineError::invalid_input("payment amount must be positive"));
        }

        let mut candidates: Vec<&UnspentOutput> = available
            .iter()
            .filter(|u| match self.config.unconfirmed_policy {
                UnconfirmedPolicy::Allow => true,
                UnconfirmedPolicy::Exclude => u.is_confirmed(),
            })
            .collect();

        // Stable: equal values keep provider order
        candidates.sort_by(|a, b| b.value_sats.cmp(&a.value_sats));

        let stop_at = target_sats.saturating_add(self.config.early_stop_margin_sats);
        let mut selected: Vec<UnspentOutput> = Vec::new();
        let mut accumulated: u64 = 0;
        let mut uses_unconfirmed = false;

        for utxo in candidates {
            selected.push(utxo.clone());
            accumulated = accumulated.saturating_add(utxo.value_sats);
            uses_unconfirmed |= !utxo.is_confirmed();

            if accumulated >= stop_at {
                let rate = self.effective_rate(requested_rate, uses_unconfirmed);
                let fee = rate.fee_for_vbytes(self.config.fee_model.estimate_vbytes(selected.len()));
                if accumulated >= target_sats.saturating_add(fee) {
                    return Ok(self.finish(selected, accumulated, target_sats, rate, fee, uses_unconfirmed));
                }
                log::debug!(
                    "Accumulated {} sats passes early stop but not fee {}, extending selection",
                    accumulated,
                    fee
                );
            }
        }

        // Exhausted without reaching the early-stop floor
        if accumulated < target_sats {
            log::warn!("Insufficient funds: have {} sats, need {}", accumulated, target_sats);
            return Err(EngineError::InsufficientFunds {
                shortfall_sats: target_sats - accumulated,
                available_sats: accumulated,
                required_sats: target_sats,
            });
        }

        let rate = self.effective_rate(requested_rate, uses_unconfirmed);
        let fee = rate.fee_for_vbytes(self.config.fee_model.estimate_vbytes(selected.len()));
        let required = target_sats.saturating_add(fee);
        if accumulated < required {
            log::warn!(
                "Insufficient funds for fee: have {} sats, need {} including fee",
                accumulated,
                required
            );
            return Err(EngineError::InsufficientFunds {
                shortfall_sats: required - accumulated,
                available_sats: accumulated,
                required_sats: required,
            });
        }

        Ok(self.finish(selected, accumulated, target_sats, rate, fee, uses_unconfirmed))
    }

    fn finish(
        &self,
        selected: Vec<UnspentOutput>,
        accumulated: u64,
        target_sats: u64,
        rate: FeeRate,
        fee: u64,
        uses_unconfirmed: bool,
    ) -> SelectionResult {
        let leftover = accumulated - target_sats - fee;
        let change_value_sats = if leftover > self.config.change_threshold_sats {
            leftover
        } else {
            0
        };

        log::debug!(
            "Selected {} inputs totalling {} sats, fee {} at {}, change {}",
            selected.len(),
            accumulated,
            fee,
            rate,
            change_value_sats
        );

        SelectionResult {
            selected_inputs: selected,
            change_value_sats,
            uses_unconfirmed_input: uses_unconfirmed,
            effective_fee_rate: rate,
            estimated_fee_sats: fee,
            target_value_sats: target_sats,
        }
    }
}
