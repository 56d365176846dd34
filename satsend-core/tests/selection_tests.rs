//! Coin selection scenarios and properties


use quickcheck::{Arbitrary, Gen, TestResult};
use quickcheck_macros::quickcheck;
use satsend_core::error::EngineError;
use satsend_core::selection::{CoinSelector, FeeModel, SelectionConfig, UnconfirmedPolicy};
use satsend_core::types::{FeeRate, UnspentOutput};
use test_helpers::{setup, txid};

fn rate(r: f64) -> FeeRate {
    FeeRate::from_sat_per_vb(r).unwrap()
}

#[test]
fn test_two_outputs_produce_change() {
    setup();

    let utxos = vec![
        UnspentOutput::confirmed(txid("aa"), 0, 50_000),
        UnspentOutput::confirmed(txid("bb"), 1, 30_000),
    ];
    let result = CoinSelector::default().select(&utxos, 60_000, rate(20.0)).unwrap();

    assert_eq!(result.selected_inputs.len(), 2);
    assert_eq!(result.estimated_fee_sats, 3_600);
    assert_eq!(result.change_value_sats, 16_400);
    assert!(!result.uses_unconfirmed_input);
    assert_eq!(result.effective_fee_rate.sat_per_vb(), 20.0);
}

#[test]
fn test_empty_set_is_no_funds() {
    setup();

    let err = CoinSelector::default().select(&[], 60_000, rate(20.0)).unwrap_err();
    assert!(matches!(err, EngineError::NoFunds));
}

#[test]
fn test_shortfall_rendered_in_btc() {
    setup();

    let utxos = vec![UnspentOutput::confirmed(txid("aa"), 0, 1_000)];
    let err = CoinSelector::default().select(&utxos, 5_000, rate(20.0)).unwrap_err();

    match &err {
        EngineError::InsufficientFunds {
            shortfall_sats,
            available_sats,
            ..
        } => {
            assert_eq!(*shortfall_sats, 4_000);
            assert_eq!(*available_sats, 1_000);
        }
        other => panic!("expected InsufficientFunds, got {:?}", other),
    }
    assert!(err.to_string().contains("0.00004000"));
}

#[test]
fn test_unconfirmed_input_raises_fee_rate() {
    setup();

    let utxos = vec![UnspentOutput::unconfirmed(txid("aa"), 0, 100_000)];
    let result = CoinSelector::default().select(&utxos, 50_000, rate(10.0)).unwrap();

    assert!(result.uses_unconfirmed_input);
    assert_eq!(result.effective_fee_rate.sat_per_vb(), 50.0);
    assert_eq!(result.estimated_fee_sats, 9_000);
    assert_eq!(result.change_value_sats, 41_000);
}

#[test]
fn test_change_threshold_boundary() {
    setup();

    // leftover exactly 5_000 is absorbed
    let utxos = vec![UnspentOutput::confirmed(txid("aa"), 0, 60_000 + 1_800 + 5_000)];
    let result = CoinSelector::default().select(&utxos, 60_000, rate(10.0)).unwrap();
    assert_eq!(result.change_value_sats, 0);

    // one more satoshi creates change
    let utxos = vec![UnspentOutput::confirmed(txid("aa"), 0, 60_000 + 1_800 + 5_001)];
    let result = CoinSelector::default().select(&utxos, 60_000, rate(10.0)).unwrap();
    assert_eq!(result.change_value_sats, 5_001);
}

#[test]
fn test_ties_keep_provider_order() {
    setup();

    let utxos = vec![
        UnspentOutput::confirmed(txid("01"), 0, 40_000),
        UnspentOutput::confirmed(txid("02"), 0, 40_000),
        UnspentOutput::confirmed(txid("03"), 0, 40_000),
    ];
    let result = CoinSelector::default().select(&utxos, 50_000, rate(1.0)).unwrap();

    let ids: Vec<_> = result.selected_inputs.iter().map(|u| u.transaction_id.clone()).collect();
    assert_eq!(ids, vec![txid("01"), txid("02")]);
}

#[test]
fn test_estimated_fee_model_counts_inputs() {
    setup();

    let selector = CoinSelector::new(SelectionConfig {
        fee_model: FeeModel::Estimated,
        ..SelectionConfig::default()
    });
    let utxos = vec![
        UnspentOutput::confirmed(txid("aa"), 0, 50_000),
        UnspentOutput::confirmed(txid("bb"), 1, 30_000),
    ];
    let result = selector.select(&utxos, 60_000, rate(10.0)).unwrap();

    // 10 + 148 * 2 + 34 * 2 = 374 vbytes
    assert_eq!(result.estimated_fee_sats, 3_740);
    assert_eq!(result.change_value_sats, 80_000 - 60_000 - 3_740);
}

#[test]
fn test_exclude_skips_unconfirmed_but_spends_confirmed() {
    setup();

    let selector = CoinSelector::new(SelectionConfig {
        unconfirmed_policy: UnconfirmedPolicy::Exclude,
        ..SelectionConfig::default()
    });
    let utxos = vec![
        UnspentOutput::unconfirmed(txid("aa"), 0, 900_000),
        UnspentOutput::confirmed(txid("bb"), 0, 80_000),
    ];
    let result = selector.select(&utxos, 60_000, rate(10.0)).unwrap();

    assert_eq!(result.selected_inputs, vec![UnspentOutput::confirmed(txid("bb"), 0, 80_000)]);
    assert!(!result.uses_unconfirmed_input);
}

#[derive(Clone, Debug)]
struct UtxoPool(Vec<UnspentOutput>);

impl Arbitrary for UtxoPool {
    fn arbitrary(g: &mut Gen) -> Self {
        let count = usize::arbitrary(g) % 12 + 1;
        let utxos = (0..count)
            .map(|i| {
                let value = u64::arbitrary(g) % 2_000_000 + 1;
                let id = format!("{:064x}", i + 1);
                if bool::arbitrary(g) {
                    UnspentOutput::confirmed(id, i as u32, value)
                } else {
                    UnspentOutput::unconfirmed(id, i as u32, value)
                }
            })
            .collect();
        UtxoPool(utxos)
    }
}

#[quickcheck]
fn selection_covers_target_and_fee(pool: UtxoPool, target: u64, rate_raw: u8) -> TestResult {
    let target = target % 3_000_000 + 1;
    let fee_rate = FeeRate::from_sat_per_vb(f64::from(rate_raw % 100) + 1.0).unwrap();

    match CoinSelector::default().select(&pool.0, target, fee_rate) {
        Ok(result) => {
            let total = result.total_selected_sats();
            let required = target + result.estimated_fee_sats;
            if total < required {
                return TestResult::failed();
            }
            let leftover = total - required;
            let change = result.change_value_sats;
            TestResult::from_bool(
                (change == 0 && leftover <= 5_000) || (change == leftover && change > 5_000),
            )
        }
        Err(EngineError::InsufficientFunds { .. }) => TestResult::passed(),
        Err(_) => TestResult::failed(),
    }
}

#[quickcheck]
fn selection_is_minimal_prefix(pool: UtxoPool, target: u64) -> TestResult {
    let target = target % 3_000_000 + 1;
    let fee_rate = FeeRate::from_sat_per_vb(5.0).unwrap();

    let result = match CoinSelector::default().select(&pool.0, target, fee_rate) {
        Ok(result) => result,
        Err(_) => return TestResult::discard(),
    };

    let mut sorted = pool.0.clone();
    sorted.sort_by(|a, b| b.value_sats.cmp(&a.value_sats));
    let n = result.selected_inputs.len();

    // Selected inputs are exactly the n largest, in order
    if result.selected_inputs[..] != sorted[..n] {
        return TestResult::failed();
    }

    // Dropping the last input must break the stopping condition
    let shorter = &sorted[..n - 1];
    let shorter_total: u64 = shorter.iter().map(|u| u.value_sats).sum();
    let shorter_rate = if shorter.iter().any(|u| !u.is_confirmed()) { 50.0 } else { 5.0 };
    let shorter_fee = (180.0 * shorter_rate) as u64;
    TestResult::from_bool(shorter_total < target + 1_000 || shorter_total < target + shorter_fee)
}

#[quickcheck]
fn unconfirmed_forces_minimum_rate(pool: UtxoPool, target: u64, rate_raw: u8) -> TestResult {
    let target = target % 3_000_000 + 1;
    let fee_rate = FeeRate::from_sat_per_vb(f64::from(rate_raw % 100) + 1.0).unwrap();

    match CoinSelector::default().select(&pool.0, target, fee_rate) {
        Ok(result) => {
            let any_unconfirmed = result.selected_inputs.iter().any(|u| !u.is_confirmed());
            let rate = result.effective_fee_rate.sat_per_vb();
            TestResult::from_bool(
                result.uses_unconfirmed_input == any_unconfirmed && (!any_unconfirmed || rate >= 50.0),
            )
        }
        Err(_) => TestResult::discard(),
    }
}

#[quickcheck]
fn insufficient_total_never_selects(pool: UtxoPool) -> bool {
    let total: u64 = pool.0.iter().map(|u| u.value_sats).sum();
    let fee_rate = FeeRate::from_sat_per_vb(1.0).unwrap();

    matches!(
        CoinSelector::default().select(&pool.0, total + 1, fee_rate),
        Err(EngineError::InsufficientFunds { .. })
    )
}
