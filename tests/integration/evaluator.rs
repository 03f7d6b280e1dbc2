//! Evaluator behaviour through the public API: the documented trigger
//! scenarios plus properties that must hold for any history.

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use lc_automator::simulation::Simulator;
use lc_automator::strategy::patterns::{pattern_2x7, pattern_3x3, terminal_8};
use lc_automator::strategy::settlement::{payout, settle, MAX_STAKE};
use lc_automator::strategy::{StrategyConfig, StrategyKind, MAX_CHIP_VALUE};
use lc_automator::types::{Wager, MAX_NUMBER};

fn chip(value: Decimal) -> StrategyConfig {
    StrategyConfig::with_chip_value(value)
}

fn amount_on(wagers: &[Wager], number: u8) -> Option<Decimal> {
    wagers.iter().find(|w| w.number == number).map(|w| w.amount)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_terminal_8_scenario() {
    let wagers = terminal_8(&[8, 6, 1, 20, 5], &chip(dec!(1.0)));
    assert_eq!(wagers.len(), 10);
    for n in [12, 28, 7, 29, 18, 22, 8, 11, 14] {
        assert_eq!(amount_on(&wagers, n), Some(dec!(1.0)), "pocket {n}");
    }
    assert_eq!(amount_on(&wagers, 30), Some(dec!(2.0)));
}

#[test]
fn test_3x3_scenario() {
    let wagers = pattern_3x3(&[3, 4, 12, 1, 2], &chip(dec!(1.0)));
    assert_eq!(wagers.len(), 11);
    assert_eq!(amount_on(&wagers, 0), Some(dec!(2.0)));
    for n in [3, 4, 12, 15, 19, 21, 26, 28, 32, 35] {
        assert_eq!(amount_on(&wagers, n), Some(dec!(1.0)), "pocket {n}");
    }
}

#[test]
fn test_2x7_scenario() {
    let wagers = pattern_2x7(&[2, 4, 7, 10, 11], &chip(dec!(1.0)));
    assert_eq!(wagers.len(), 14);
    assert!(wagers.iter().all(|w| w.amount == dec!(1.0)));
    let mut numbers: Vec<u8> = wagers.iter().map(|w| w.number).collect();
    numbers.sort_unstable();
    assert_eq!(
        numbers,
        vec![2, 4, 7, 12, 17, 18, 19, 21, 22, 25, 28, 29, 34, 35]
    );
}

#[test]
fn test_repeated_five_fires_nothing() {
    let config = StrategyConfig::default();
    for kind in StrategyKind::ALL {
        assert!(kind.evaluate(&[5, 5, 5], &config).wagers.is_empty(), "{kind}");
    }
}

#[test]
fn test_terminal_8_oldest_first_scaled() {
    let wagers = terminal_8(&[1, 6, 8], &chip(dec!(2.5)));
    assert_eq!(wagers.len(), 10);
    assert_eq!(amount_on(&wagers, 12), Some(dec!(2.5)));
    assert_eq!(amount_on(&wagers, 30), Some(dec!(5.0)));
}

#[test]
fn test_payout_rule() {
    assert_eq!(payout(30, dec!(2), 30), dec!(70));
    assert_eq!(payout(30, dec!(2), 31), dec!(-2));
}

#[test]
fn test_largest_chip_value_evaluates_and_settles() {
    let config = chip(MAX_CHIP_VALUE);
    assert!(config.validate().is_ok());
    assert!(chip(MAX_CHIP_VALUE + dec!(0.01)).validate().is_err());

    for kind in StrategyKind::ALL {
        let history = match kind {
            StrategyKind::Terminal8 => [8, 6, 1],
            StrategyKind::Pattern3x3 => [3, 4, 12],
            StrategyKind::Pattern2x7 => [2, 4, 7],
        };
        let result = kind.evaluate(&history, &config);
        assert!(result.triggered, "{kind}");
        for wager in &result.wagers {
            assert!(wager.amount <= MAX_STAKE);
            let won = settle(&[wager.number], wager.amount, wager.number);
            assert_eq!(won.profit, wager.amount * dec!(35));
        }
    }

    let report = Simulator::default()
        .with_seed(3)
        .run(StrategyKind::Pattern2x7, &config, 5_000);
    assert_eq!(report.num_spins, 5_000);
}

#[test]
fn test_replay_settles_on_next_spin() {
    let report = Simulator::default().replay(
        StrategyKind::Terminal8,
        &StrategyConfig::default(),
        [1, 6, 8, 30],
    );
    assert_eq!(report.triggers, 1);
    assert_eq!(report.total_wagers, 10);
    assert_eq!(report.winning_wagers, 1);
    assert_eq!(report.total_profit, dec!(61));
    assert_eq!(report.unsettled_wagers, 0);
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

fn spin() -> impl Strategy<Value = u8> {
    0..=MAX_NUMBER
}

fn history() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(spin(), 0..25)
}

fn kind() -> impl Strategy<Value = StrategyKind> {
    prop::sample::select(StrategyKind::ALL.to_vec())
}

proptest! {
    #[test]
    fn prop_evaluation_is_deterministic(kind in kind(), history in history()) {
        let config = StrategyConfig::default();
        prop_assert_eq!(kind.evaluate(&history, &config), kind.evaluate(&history, &config));
    }

    #[test]
    fn prop_short_history_never_fires(kind in kind(), history in prop::collection::vec(spin(), 0..3)) {
        let result = kind.evaluate(&history, &StrategyConfig::default());
        prop_assert!(!result.triggered);
        prop_assert!(result.wagers.is_empty());
    }

    #[test]
    fn prop_all_or_nothing(kind in kind(), history in history()) {
        let result = kind.evaluate(&history, &StrategyConfig::default());
        if result.triggered {
            prop_assert_eq!(result.wagers.len(), kind.stakes().len());
        } else {
            prop_assert!(result.wagers.is_empty());
        }
    }

    #[test]
    fn prop_stakes_scale_with_chip(kind in kind(), history in history(), cents in 1u32..100_000) {
        let unit = kind.evaluate(&history, &StrategyConfig::default());
        let value = Decimal::new(i64::from(cents), 2);
        let scaled = kind.evaluate(&history, &chip(value));

        prop_assert_eq!(unit.triggered, scaled.triggered);
        for (a, b) in unit.wagers.iter().zip(&scaled.wagers) {
            prop_assert_eq!(a.number, b.number);
            prop_assert_eq!(a.amount * value, b.amount);
        }
    }

    #[test]
    fn prop_only_recent_three_matter(kind in kind(), head in prop::collection::vec(spin(), 3), a in history(), b in history()) {
        let config = StrategyConfig::default();
        let left: Vec<u8> = head.iter().chain(&a).copied().collect();
        let right: Vec<u8> = head.iter().chain(&b).copied().collect();
        prop_assert_eq!(kind.evaluate(&left, &config), kind.evaluate(&right, &config));
    }
}
