//! Unsigned transaction templates handed to the external signer
//!
//! A [`TransactionTemplate`] is built once from a [`SelectionResult`] and
//! never changes afterwards. It carries one payment output and at most one
//! change output back to the sender. Signers that prefer wire structures can
//! convert it to an unsigned `bitcoin::Transaction` or a PSBT.

use bitcoin::address::NetworkUnchecked;
use bitcoin::psbt::PartiallySignedTransaction;
use bitcoin::{absolute, Address, Network, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};
use crate::selection::SelectionResult;
use crate::types::{FeeRate, UnspentOutput};

/// Version used for unsigned transactions
const TX_VERSION: i32 = 2;

/// A payment or change output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateOutput {
    pub address: String,
    pub value_sats: u64,
}

/// Everything a signer needs to produce the final transaction
///
/// Only [`build`] creates templates, so the payment output is always present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionTemplate {
    inputs: Vec<UnspentOutput>,
    outputs: Vec<TemplateOutput>,
    fee_rate: FeeRate,
    sender_address: String,
    change_address: Option<String>,
    change_value_sats: u64,
    uses_unconfirmed_input: bool,
}

/// Build a template paying `amount_sats` to `recipient` from `selection`
///
/// Pure: no network access. Addresses must be non-empty and the amount must
/// be positive and equal to the selection target.
pub fn build(
    sender: &str,
    recipient: &str,
    amount_sats: u64,
    selection: &SelectionResult,
) -> EngineResult<TransactionTemplate> {
    let sender = sender.trim();
    let recipient = recipient.trim();

    if sender.is_empty() {
        return Err(EngineError::invalid_input("sender address is empty"));
    }
    if recipient.is_empty() {
        return Err(EngineError::invalid_input("recipient address is empty"));
    }
    if amount_sats == 0 {
        return Err(EngineError::invalid_input("payment amount must be positive"));
    }
    if amount_sats != selection.target_value_sats {
        return Err(EngineError::invalid_input(format!(
            "amount {} does not match selection target {}",
            amount_sats, selection.target_value_sats
        )));
    }

    let mut outputs = vec![TemplateOutput {
        address: recipient.to_string(),
        value_sats: amount_sats,
    }];

    let change_address = if selection.change_value_sats > 0 {
        outputs.push(TemplateOutput {
            address: sender.to_string(),
            value_sats: selection.change_value_sats,
        });
        Some(sender.to_string())
    } else {
        None
    };

    Ok(TransactionTemplate {
        inputs: selection.selected_inputs.clone(),
        outputs,
        fee_rate: selection.effective_fee_rate,
        sender_address: sender.to_string(),
        change_address,
        change_value_sats: selection.change_value_sats,
        uses_unconfirmed_input: selection.uses_unconfirmed_input,
    })
}

fn parse_address(address: &str, network: Network) -> EngineResult<Address> {
    Address::<NetworkUnchecked>::from_str(address)
        .map_err(|e| EngineError::invalid_input(format!("invalid address '{}': {}", address, e)))?
        .require_network(network)
        .map_err(|e| EngineError::invalid_input(format!("address '{}' not valid for {}: {}", address, network, e)))
}

impl TransactionTemplate {
    pub fn inputs(&self) -> &[UnspentOutput] {
        &self.inputs
    }

    /// Payment output first, then the change output if any
    pub fn outputs(&self) -> &[TemplateOutput] {
        &self.outputs
    }

    pub fn payment_output(&self) -> &TemplateOutput {
        &self.outputs[0]
    }

    pub fn fee_rate(&self) -> FeeRate {
        self.fee_rate
    }

    pub fn sender_address(&self) -> &str {
        &self.sender_address
    }

    pub fn change_address(&self) -> Option<&str> {
        self.change_address.as_deref()
    }

    pub fn change_value_sats(&self) -> u64 {
        self.change_value_sats
    }

    pub fn uses_unconfirmed_input(&self) -> bool {
        self.uses_unconfirmed_input
    }

    pub fn total_input_sats(&self) -> u64 {
        self.inputs.iter().map(|i| i.value_sats).sum()
    }

    pub fn total_output_sats(&self) -> u64 {
        self.outputs.iter().map(|o| o.value_sats).sum()
    }

    /// Fee paid by the template, including any absorbed change
    pub fn fee_sats(&self) -> u64 {
        self.total_input_sats().saturating_sub(self.total_output_sats())
    }

    /// Unsigned transaction: version 2, locktime 0, empty scripts, final sequences
    pub fn to_unsigned_transaction(&self, network: Network) -> EngineResult<Transaction> {
        let input = self
            .inputs
            .iter()
            .map(|utxo| {
                let txid = Txid::from_str(&utxo.transaction_id).map_err(|e| {
                    EngineError::invalid_input(format!("invalid txid '{}': {}", utxo.transaction_id, e))
                })?;
                Ok(TxIn {
                    previous_output: OutPoint::new(txid, utxo.output_index),
                    script_sig: ScriptBuf::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::new(),
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let output = self
            .outputs
            .iter()
            .map(|out| {
                let address = parse_address(&out.address, network)?;
                Ok(TxOut {
                    value: out.value_sats,
                    script_pubkey: address.script_pubkey(),
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        Ok(Transaction {
            version: TX_VERSION,
            lock_time: absolute::LockTime::ZERO,
            input,
            output,
        })
    }

    /// PSBT wrapping the unsigned transaction
    pub fn to_psbt(&self, network: Network) -> EngineResult<PartiallySignedTransaction> {
        let tx = self.to_unsigned_transaction(network)?;
        PartiallySignedTransaction::from_unsigned_tx(tx)
            .map_err(|e| EngineError::invalid_input(format!("could not build PSBT: {}", e)))
    }

    /// Base64 text form of [`TransactionTemplate::to_psbt`]
    pub fn to_psbt_base64(&self, network: Network) -> EngineResult<String> {
        Ok(base64::encode(self.to_psbt(network)?.serialize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConfirmationStatus;

    const SENDER: &str = "1BoatSLRHtKNngkdXEeobR76b53LETtpyT";
    const RECIPIENT: &str = "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq";

    fn selection(change: u64) -> SelectionResult {
        SelectionResult {
            selected_inputs: vec![
                UnspentOutput::confirmed("aa".repeat(32), 0, 50_000),
                UnspentOutput::new("bb".repeat(32), 1, 30_000, ConfirmationStatus::Unconfirmed),
            ],
            change_value_sats: change,
            uses_unconfirmed_input: true,
            effective_fee_rate: FeeRate::from_sat_per_vb(50.0).unwrap(),
            estimated_fee_sats: 9_000,
            target_value_sats: 60_000,
        }
    }

    #[test]
    fn test_build_with_change() {
        let template = build(SENDER, RECIPIENT, 60_000, &selection(11_000)).unwrap();
        assert_eq!(template.outputs().len(), 2);
        assert_eq!(template.payment_output().address, RECIPIENT);
        assert_eq!(template.change_address(), Some(SENDER));
        assert_eq!(template.outputs()[1].value_sats, 11_000);
        assert_eq!(template.fee_sats(), 9_000);
        assert!(template.uses_unconfirmed_input());
    }

    #[test]
    fn test_build_without_change() {
        let template = build(SENDER, RECIPIENT, 60_000, &selection(0)).unwrap();
        assert_eq!(template.outputs().len(), 1);
        assert!(template.change_address().is_none());
        assert_eq!(template.fee_sats(), 20_000);
    }

    #[test]
    fn test_build_rejects_bad_input() {
        assert!(build("", RECIPIENT, 60_000, &selection(0)).is_err());
        assert!(build(SENDER, "  ", 60_000, &selection(0)).is_err());
        assert!(build(SENDER, RECIPIENT, 0, &selection(0)).is_err());
        assert!(build(SENDER, RECIPIENT, 59_000, &selection(0)).is_err());
    }

    #[test]
    fn test_unsigned_transaction_layout() {
        let template = build(SENDER, RECIPIENT, 60_000, &selection(11_000)).unwrap();
        let tx = template.to_unsigned_transaction(Network::Bitcoin).unwrap();

        assert_eq!(tx.version, 2);
        assert_eq!(tx.lock_time, absolute::LockTime::ZERO);
        assert_eq!(tx.input.len(), 2);
        assert_eq!(tx.input[1].previous_output.vout, 1);
        assert!(tx.input.iter().all(|i| i.script_sig.is_empty() && i.sequence == Sequence::MAX));
        assert_eq!(tx.output[0].value, 60_000);
        assert_eq!(tx.output[1].value, 11_000);
    }

    #[test]
    fn test_network_mismatch_is_invalid_input() {
        let template = build(SENDER, RECIPIENT, 60_000, &selection(0)).unwrap();
        let err = template.to_unsigned_transaction(Network::Testnet).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn test_psbt_base64() {
        let template = build(SENDER, RECIPIENT, 60_000, &selection(0)).unwrap();
        let encoded = template.to_psbt_base64(Network::Bitcoin).unwrap();
        let raw = base64::decode(&encoded).unwrap();
        assert_eq!(&raw[..5], b"psbt\xff");
    }
}
