//! Trigger predicates and stake tables for the built-in roulette patterns.
//!
//! Every pattern only looks at the three most recent spins, so evaluation
//! is constant time regardless of how long the history is.

use rust_decimal::Decimal;
use serde::Serialize;

use super::{StrategyConfig, StrategyKind};
use crate::types::Wager;

/// Number of most-recent spins a trigger inspects.
pub const TRIGGER_WINDOW: usize = 3;

/// A fixed stake: `chips` units of the configured chip value on `number`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stake {
    pub number: u8,
    pub chips: u32,
}

const fn chips(number: u8, chips: u32) -> Stake {
    Stake { number, chips }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

pub const TERMINAL_8_STAKES: &[Stake] = &[
    chips(12, 1),
    chips(28, 1),
    chips(7, 1),
    chips(29, 1),
    chips(18, 1),
    chips(22, 1),
    chips(8, 1),
    chips(11, 1),
    chips(14, 1),
    chips(30, 2),
];

pub const PATTERN_3X3_TARGETS: &[u8] = &[0, 3, 4, 12, 15, 19, 21, 26, 28, 32, 35];

/// One chip per target, doubled on zero.
pub const PATTERN_3X3_STAKES: &[Stake] = &[
    chips(0, 2),
    chips(3, 1),
    chips(4, 1),
    chips(12, 1),
    chips(15, 1),
    chips(19, 1),
    chips(21, 1),
    chips(26, 1),
    chips(28, 1),
    chips(32, 1),
    chips(35, 1),
];

pub const PATTERN_2X7_TARGETS: &[u8] = &[2, 4, 7, 12, 17, 18, 19, 21, 22, 25, 28, 29, 34, 35];

pub const PATTERN_2X7_STAKES: &[Stake] = &[
    chips(2, 1),
    chips(4, 1),
    chips(7, 1),
    chips(12, 1),
    chips(17, 1),
    chips(18, 1),
    chips(19, 1),
    chips(21, 1),
    chips(22, 1),
    chips(25, 1),
    chips(28, 1),
    chips(29, 1),
    chips(34, 1),
    chips(35, 1),
];

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

/// 1 → 6 → 8 across the three most recent spins.
///
/// Chronologically the window reads 1, 6, 8 when the history (most recent
/// first) starts `[8, 6, 1]`. Feeds that deliver the window oldest-first
/// start `[1, 6, 8]`; both orientations fire.
pub fn terminal_8_triggered(history: &[u8]) -> bool {
    matches!(history, [8, 6, 1, ..] | [1, 6, 8, ..])
}

/// All of the three most recent spins belong to `targets`.
pub fn recent_spins_within(history: &[u8], targets: &[u8]) -> bool {
    history.len() >= TRIGGER_WINDOW
        && history[..TRIGGER_WINDOW]
            .iter()
            .all(|n| targets.contains(n))
}

/// Expand a stake table into wagers at the given chip value.
pub fn wagers_for(stakes: &[Stake], chip_value: Decimal) -> Vec<Wager> {
    stakes
        .iter()
        .map(|s| Wager::new(s.number, chip_value.saturating_mul(Decimal::from(s.chips))))
        .collect()
}

// ---------------------------------------------------------------------------
// Per-variant entry points
// ---------------------------------------------------------------------------

/// Wagers for the terminal 8 strategy (empty unless triggered).
pub fn terminal_8(history: &[u8], config: &StrategyConfig) -> Vec<Wager> {
    StrategyKind::Terminal8.evaluate(history, config).wagers
}

/// Wagers for the 3x3 pattern (empty unless triggered).
pub fn pattern_3x3(history: &[u8], config: &StrategyConfig) -> Vec<Wager> {
    StrategyKind::Pattern3x3.evaluate(history, config).wagers
}

/// Wagers for the 2x7 pattern (empty unless triggered).
pub fn pattern_2x7(history: &[u8], config: &StrategyConfig) -> Vec<Wager> {
    StrategyKind::Pattern2x7.evaluate(history, config).wagers
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
