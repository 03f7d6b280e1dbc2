//! Strategy simulator.
//!
//! Drives one strategy over a sequence of spins and reports profit, win
//! rate and drawdown. Wagers produced after spin `k` are settled against
//! spin `k + 1`, the first result they could actually have been placed on.

use rust_decimal::prelude::*;
use serde::Serialize;
use tracing::debug;

use super::RouletteWheel;
use crate::strategy::settlement::payout;
use crate::strategy::{StrategyConfig, StrategyKind};
use crate::types::{is_valid_number, SpinHistory, Wager, DEFAULT_HISTORY_WINDOW};

/// Number of most recent settled rounds kept in a report.
pub const MAX_REPORTED_ROUNDS: usize = 50;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// One settled round: the wagers from a trigger and the spin that decided them.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationRound {
    /// 1-based index of the deciding spin.
    pub spin: usize,
    pub winning_number: u8,
    pub wagers: Vec<Wager>,
    pub profit: Decimal,
    pub cumulative_profit: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub strategy_type: StrategyKind,
    pub config: StrategyConfig,
    pub num_spins: usize,
    pub triggers: usize,
    pub total_profit: Decimal,
    pub total_wagers: usize,
    pub winning_wagers: usize,
    pub losing_wagers: usize,
    /// Percentage of winning wagers (0–100).
    pub win_rate: f64,
    pub avg_profit_per_wager: Decimal,
    /// Largest fall from a running profit peak.
    pub max_drawdown: Decimal,
    /// Wagers generated on the final spin, never settled.
    pub unsettled_wagers: usize,
    /// Most recent settled rounds, oldest first.
    pub rounds: Vec<SimulationRound>,
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct Simulator {
    history_window: usize,
    seed: Option<u64>,
}

impl Default for Simulator {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            seed: None,
        }
    }
}

impl Simulator {
    pub fn new(history_window: usize, seed: Option<u64>) -> Self {
        Self {
            history_window,
            seed,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn wheel(&self) -> RouletteWheel {
        match self.seed {
            Some(seed) => RouletteWheel::seeded(seed),
            None => RouletteWheel::from_entropy(),
        }
    }

    /// Simulate `num_spins` random spins.
    pub fn run(
        &self,
        kind: StrategyKind,
        config: &StrategyConfig,
        num_spins: usize,
    ) -> SimulationReport {
        self.replay(kind, config, self.wheel().take(num_spins))
    }

    /// Run every built-in strategy on the same spin sequence.
    ///
    /// Without a seed a single random sequence is drawn and shared.
    pub fn compare(&self, config: &StrategyConfig, num_spins: usize) -> Vec<SimulationReport> {
        let spins: Vec<u8> = self.wheel().take(num_spins).collect();
        StrategyKind::ALL
            .iter()
            .map(|kind| self.replay(*kind, config, spins.iter().copied()))
            .collect()
    }

    /// Simulate a fixed spin sequence (oldest first).
    pub fn replay(
        &self,
        kind: StrategyKind,
        config: &StrategyConfig,
        spins: impl IntoIterator<Item = u8>,
    ) -> SimulationReport {
        let mut history = SpinHistory::new(self.history_window);
        let mut open: Vec<Wager> = Vec::new();
        let mut rounds: Vec<SimulationRound> = Vec::new();

        let mut num_spins = 0usize;
        let mut triggers = 0usize;
        let mut total_profit = Decimal::ZERO;
        let mut total_wagers = 0usize;
        let mut winning_wagers = 0usize;
        let mut peak = Decimal::ZERO;
        let mut max_drawdown = Decimal::ZERO;

        for number in spins {
            if !is_valid_number(number) {
                debug!(number, "Skipping out-of-range spin");
                continue;
            }
            num_spins += 1;

            // Settle what was placed after the previous spin
            if !open.is_empty() {
                let mut round_profit = Decimal::ZERO;
                for wager in &open {
                    let p = payout(wager.number, wager.amount, number);
                    if p > Decimal::ZERO {
                        winning_wagers += 1;
                    }
                    round_profit += p;
                }
                total_wagers += open.len();
                total_profit += round_profit;

                peak = peak.max(total_profit);
                max_drawdown = max_drawdown.max(peak - total_profit);

                rounds.push(SimulationRound {
                    spin: num_spins,
                    winning_number: number,
                    wagers: std::mem::take(&mut open),
                    profit: round_profit,
                    cumulative_profit: total_profit,
                });
                if rounds.len() > MAX_REPORTED_ROUNDS {
                    rounds.remove(0);
                }
            }

            if history.record(number).is_err() {
                continue;
            }

            let result = kind.evaluate(history.as_slice(), config);
            if result.triggered {
                triggers += 1;
                open = result.wagers;
            }
        }

        let losing_wagers = total_wagers - winning_wagers;
        let (win_rate, avg_profit_per_wager) = if total_wagers > 0 {
            (
                winning_wagers as f64 / total_wagers as f64 * 100.0,
                total_profit / Decimal::from(total_wagers),
            )
        } else {
            (0.0, Decimal::ZERO)
        };

        SimulationReport {
            strategy_type: kind,
            config: config.clone(),
            num_spins,
            triggers,
            total_profit,
            total_wagers,
            winning_wagers,
            losing_wagers,
            win_rate,
            avg_profit_per_wager,
            max_drawdown,
            unsettled_wagers: open.len(),
            rounds,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sim() -> Simulator {
        Simulator::default().with_seed(1234)
    }

    #[test]
    fn test_settles_on_next_spin() {
        let report = sim().replay(
            StrategyKind::Terminal8,
            &StrategyConfig::default(),
            [1, 6, 8, 30],
        );
        assert_eq!(report.triggers, 1);
        assert_eq!(report.total_wagers, 10);
        assert_eq!(report.winning_wagers, 1);
        // 30 carries two chips: 2 * 35 - 9
        assert_eq!(report.total_profit, dec!(61));
        assert_eq!(report.rounds.len(), 1);
        assert_eq!(report.rounds[0].spin, 4);
        assert_eq!(report.rounds[0].winning_number, 30);
        assert_eq!(report.unsettled_wagers, 0);
    }

    #[test]
    fn test_out_of_range_spin_is_skipped() {
        let report = sim().replay(
            StrategyKind::Terminal8,
            &StrategyConfig::default(),
            [1, 6, 8, 37, 30],
        );
        assert_eq!(report.num_spins, 4);
        assert_eq!(report.rounds.len(), 1);
        assert_eq!(report.rounds[0].winning_number, 30);
        assert_eq!(report.rounds[0].spin, 4);
        assert_eq!(report.total_profit, dec!(61));
    }

    #[test]
    fn test_trigger_on_last_spin_is_unsettled() {
        let report = sim().replay(StrategyKind::Terminal8, &StrategyConfig::default(), [1, 6, 8]);
        assert_eq!(report.triggers, 1);
        assert_eq!(report.total_wagers, 0);
        assert_eq!(report.unsettled_wagers, 10);
        assert_eq!(report.win_rate, 0.0);
    }

    #[test]
    fn test_losing_round_and_drawdown() {
        // 3x3 fires after 3, 4, 12 and 5 misses all 11 wagers (12 chips)
        let report = sim().replay(
            StrategyKind::Pattern3x3,
            &StrategyConfig::default(),
            [3, 4, 12, 5],
        );
        assert_eq!(report.total_profit, dec!(-12));
        assert_eq!(report.losing_wagers, 11);
        assert_eq!(report.max_drawdown, dec!(12));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let cfg = StrategyConfig::default();
        let a = sim().run(StrategyKind::Pattern2x7, &cfg, 2_000);
        let b = sim().run(StrategyKind::Pattern2x7, &cfg, 2_000);
        assert_eq!(a.total_profit, b.total_profit);
        assert_eq!(a.total_wagers, b.total_wagers);
        assert_eq!(a.num_spins, 2_000);
    }

    #[test]
    fn test_rounds_capped() {
        let report = sim().run(StrategyKind::Pattern2x7, &StrategyConfig::default(), 20_000);
        assert!(report.triggers > MAX_REPORTED_ROUNDS);
        assert_eq!(report.rounds.len(), MAX_REPORTED_ROUNDS);
        assert_eq!(
            report.rounds.last().unwrap().cumulative_profit,
            report.total_profit
        );
    }

    #[test]
    fn test_compare_covers_all_strategies() {
        let reports = sim().compare(&StrategyConfig::default(), 500);
        let kinds: Vec<StrategyKind> = reports.iter().map(|r| r.strategy_type).collect();
        assert_eq!(kinds, StrategyKind::ALL.to_vec());
        assert!(reports.iter().all(|r| r.num_spins == 500));
    }

    #[test]
    fn test_profit_scales_with_chip_value() {
        let spins: Vec<u8> = RouletteWheel::seeded(99).take(3_000).collect();
        let one = sim().replay(
            StrategyKind::Pattern3x3,
            &StrategyConfig::default(),
            spins.iter().copied(),
        );
        let three = sim().replay(
            StrategyKind::Pattern3x3,
            &StrategyConfig::with_chip_value(dec!(3)),
            spins.iter().copied(),
        );
        assert_eq!(three.total_profit, one.total_profit * dec!(3));
    }
}
