//! Strategy engine: trigger detection, wager tables, schedules and
//! settlement for roulette betting strategies.
//!
//! The evaluator is a pure function of `(history, config)`: it performs no
//! I/O, keeps no state and never fails. Errors only arise at the boundary
//! where string identifiers and raw config maps are turned into typed
//! values.

pub mod patterns;
pub mod schedule;
pub mod settlement;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::types::{StrategyError, Wager};
use patterns::Stake;
use schedule::Schedule;

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// The built-in strategy variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    /// Seek terminal 8 after a 1 → 6 run.
    #[serde(rename = "terminal_8")]
    Terminal8,
    #[serde(rename = "3x3_pattern")]
    Pattern3x3,
    #[serde(rename = "2x7_pattern")]
    Pattern2x7,
}

impl StrategyKind {
    pub const ALL: &'static [StrategyKind] = &[
        StrategyKind::Terminal8,
        StrategyKind::Pattern3x3,
        StrategyKind::Pattern2x7,
    ];

    /// Wire identifier, as stored in strategy definitions.
    pub fn id(&self) -> &'static str {
        match self {
            StrategyKind::Terminal8 => "terminal_8",
            StrategyKind::Pattern3x3 => "3x3_pattern",
            StrategyKind::Pattern2x7 => "2x7_pattern",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StrategyKind::Terminal8 => "Terminal 8 (1→6)",
            StrategyKind::Pattern3x3 => "3x3 Pattern",
            StrategyKind::Pattern2x7 => "2x7 Pattern",
        }
    }

    /// The fixed stake table emitted when the trigger fires.
    pub fn stakes(&self) -> &'static [Stake] {
        match self {
            StrategyKind::Terminal8 => patterns::TERMINAL_8_STAKES,
            StrategyKind::Pattern3x3 => patterns::PATTERN_3X3_STAKES,
            StrategyKind::Pattern2x7 => patterns::PATTERN_2X7_STAKES,
        }
    }

    /// Whether the firing condition holds for `history` (most recent first).
    pub fn is_triggered(&self, history: &[u8], trigger: TriggerMode) -> bool {
        match self {
            StrategyKind::Terminal8 => match trigger {
                TriggerMode::Consecutive => patterns::terminal_8_triggered(history),
                // Rejected by `StrategyConfig::validate`; never fires.
                TriggerMode::GapOne | TriggerMode::GapTwo | TriggerMode::GapThree => false,
            },
            StrategyKind::Pattern3x3 => {
                patterns::recent_spins_within(history, patterns::PATTERN_3X3_TARGETS)
            }
            StrategyKind::Pattern2x7 => {
                patterns::recent_spins_within(history, patterns::PATTERN_2X7_TARGETS)
            }
        }
    }

    /// Evaluate this strategy against a history.
    ///
    /// Returns the full stake table scaled by `chip_value` when the trigger
    /// holds, and an empty wager list otherwise.
    pub fn evaluate(&self, history: &[u8], config: &StrategyConfig) -> TriggerResult {
        if !self.is_triggered(history, config.trigger) {
            return TriggerResult::none();
        }
        TriggerResult {
            triggered: true,
            wagers: patterns::wagers_for(self.stakes(), config.chip_value),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for StrategyKind {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "terminal_8" => Ok(StrategyKind::Terminal8),
            "3x3_pattern" => Ok(StrategyKind::Pattern3x3),
            "2x7_pattern" => Ok(StrategyKind::Pattern2x7),
            other => Err(StrategyError::UnknownVariant(other.to_string())),
        }
    }
}

/// How the terminal 8 trigger matches 1, 6 and 8 in the history.
///
/// Only the consecutive form is implemented. The gapped forms (one, two or
/// three spins between each number) are declared so configs can name them,
/// but validation rejects them as not implemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    #[default]
    Consecutive,
    GapOne,
    GapTwo,
    GapThree,
}

impl TriggerMode {
    pub fn is_implemented(&self) -> bool {
        matches!(self, TriggerMode::Consecutive)
    }

    /// Spins skipped between each number of the trigger.
    pub fn gap(&self) -> usize {
        match self {
            TriggerMode::Consecutive => 0,
            TriggerMode::GapOne => 1,
            TriggerMode::GapTwo => 2,
            TriggerMode::GapThree => 3,
        }
    }
}

/// Result of evaluating one strategy against one history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerResult {
    pub triggered: bool,
    pub wagers: Vec<Wager>,
}

impl TriggerResult {
    pub fn none() -> Self {
        Self {
            triggered: false,
            wagers: Vec::new(),
        }
    }

    /// Sum of all wager amounts.
    pub fn total_stake(&self) -> Decimal {
        self.wagers.iter().map(|w| w.amount).sum()
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Largest accepted chip value. Keeps every stake and payout well inside
/// `Decimal` range.
pub const MAX_CHIP_VALUE: Decimal = dec!(1000000);

fn default_chip_value() -> Decimal {
    dec!(1.0)
}

/// Per-strategy options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Base stake unit; "two chips" means twice this.
    #[serde(default = "default_chip_value")]
    pub chip_value: Decimal,
    /// Reserved for entry limiting; not used by the current rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_entries: Option<u32>,
    /// Houses this strategy may fire on. Empty means it never fires.
    #[serde(default)]
    pub betting_houses: BTreeSet<String>,
    #[serde(default)]
    pub trigger: TriggerMode,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            chip_value: default_chip_value(),
            max_entries: None,
            betting_houses: BTreeSet::new(),
            trigger: TriggerMode::default(),
        }
    }
}

impl StrategyConfig {
    pub fn with_chip_value(chip_value: Decimal) -> Self {
        Self {
            chip_value,
            ..Self::default()
        }
    }

    /// Parse and validate a raw config map. `null` yields the defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self, StrategyError> {
        if value.is_null() {
            return Ok(Self::default());
        }
        let config: StrategyConfig = serde_json::from_value(value)
            .map_err(|e| StrategyError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        if self.chip_value <= Decimal::ZERO {
            return Err(StrategyError::InvalidConfig(format!(
                "chip_value must be positive, got {}",
                self.chip_value
            )));
        }
        if self.chip_value > MAX_CHIP_VALUE {
            return Err(StrategyError::InvalidConfig(format!(
                "chip_value must be at most {MAX_CHIP_VALUE}, got {}",
                self.chip_value
            )));
        }
        if self.max_entries == Some(0) {
            return Err(StrategyError::InvalidConfig(
                "max_entries must be at least 1".to_string(),
            ));
        }
        if !self.trigger.is_implemented() {
            return Err(StrategyError::NotImplemented(format!(
                "terminal_8 trigger with a gap of {}",
                self.trigger.gap()
            )));
        }
        Ok(())
    }

    pub fn accepts_house(&self, house: &str) -> bool {
        self.betting_houses.contains(house)
    }
}

/// What to do with a definition whose strategy type is not recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownStrategyPolicy {
    /// Refuse the definition with `StrategyError::UnknownVariant`.
    #[default]
    Reject,
    /// Log a warning and treat the definition as inert.
    Ignore,
}

impl UnknownStrategyPolicy {
    /// Resolve a strategy identifier under this policy.
    ///
    /// `Ok(None)` means the identifier is unknown and the policy ignores it.
    pub fn resolve(&self, strategy_type: &str) -> Result<Option<StrategyKind>, StrategyError> {
        match strategy_type.parse::<StrategyKind>() {
            Ok(kind) => Ok(Some(kind)),
            Err(e) => match self {
                UnknownStrategyPolicy::Reject => Err(e),
                UnknownStrategyPolicy::Ignore => {
                    warn!(strategy_type, "Unknown strategy type ignored");
                    Ok(None)
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// A user-defined strategy: variant, options, activation and schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyDefinition {
    pub id: u64,
    pub name: String,
    /// Variant identifier (`terminal_8`, `3x3_pattern`, `2x7_pattern`).
    pub strategy_type: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub config: StrategyConfig,
    #[serde(default)]
    pub schedule: Schedule,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StrategyDefinition {
    pub fn kind(&self) -> Result<StrategyKind, StrategyError> {
        self.strategy_type.parse()
    }

    /// Check the definition before it is stored or run.
    pub fn validate(&self, policy: UnknownStrategyPolicy) -> Result<(), StrategyError> {
        policy.resolve(&self.strategy_type)?;
        self.config.validate()?;
        self.schedule.validate()
    }

    /// Active flag plus schedule window at the given local time.
    pub fn is_active_at(&self, now: NaiveDateTime) -> bool {
        self.active && self.schedule.is_active_at(now)
    }
}

// ---------------------------------------------------------------------------
// Evaluation log
// ---------------------------------------------------------------------------

/// Record of what happened to each strategy during one evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EvaluationRecord {
    Triggered {
        strategy_id: u64,
        kind: StrategyKind,
        wagers: Vec<Wager>,
    },
    NotTriggered {
        strategy_id: u64,
        kind: StrategyKind,
    },
    /// Inactive flag or outside its schedule window.
    Inactive { strategy_id: u64 },
    /// Live house is not in the strategy's `betting_houses`.
    WrongHouse { strategy_id: u64 },
    /// Unknown strategy type skipped under `UnknownStrategyPolicy::Ignore`.
    Unknown {
        strategy_id: u64,
        strategy_type: String,
    },
}

/// Wagers produced by one strategy in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategyWagers {
    pub strategy_id: u64,
    pub kind: StrategyKind,
    pub wagers: Vec<Wager>,
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Runs a set of strategy definitions against the live history.
///
/// Filters by activation, schedule and betting house, dispatches each
/// definition to its variant and keeps a record of every decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyEvaluator {
    policy: UnknownStrategyPolicy,
}

impl StrategyEvaluator {
    pub fn new(policy: UnknownStrategyPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> UnknownStrategyPolicy {
        self.policy
    }

    /// Evaluate every definition for the given house at local time `now`.
    ///
    /// Only fails when a definition has an unknown type and the policy is
    /// `Reject`.
    pub fn evaluate_all(
        &self,
        definitions: &[StrategyDefinition],
        history: &[u8],
        betting_house: &str,
        now: NaiveDateTime,
    ) -> Result<(Vec<StrategyWagers>, Vec<EvaluationRecord>), StrategyError> {
        let mut fired = Vec::new();
        let mut records = Vec::with_capacity(definitions.len());

        for def in definitions {
            if !def.is_active_at(now) {
                records.push(EvaluationRecord::Inactive { strategy_id: def.id });
                continue;
            }
            if !def.config.accepts_house(betting_house) {
                debug!(strategy_id = def.id, betting_house, "Strategy not enabled for house");
                records.push(EvaluationRecord::WrongHouse { strategy_id: def.id });
                continue;
            }
            let Some(kind) = self.policy.resolve(&def.strategy_type)? else {
                records.push(EvaluationRecord::Unknown {
                    strategy_id: def.id,
                    strategy_type: def.strategy_type.clone(),
                });
                continue;
            };

            let result = kind.evaluate(history, &def.config);
            if result.triggered {
                info!(
                    strategy_id = def.id,
                    kind = %kind,
                    wagers = result.wagers.len(),
                    stake = %result.total_stake(),
                    "Strategy triggered"
                );
                records.push(EvaluationRecord::Triggered {
                    strategy_id: def.id,
                    kind,
                    wagers: result.wagers.clone(),
                });
                fired.push(StrategyWagers {
                    strategy_id: def.id,
                    kind,
                    wagers: result.wagers,
                });
            } else {
                records.push(EvaluationRecord::NotTriggered {
                    strategy_id: def.id,
                    kind,
                });
            }
        }

        Ok((fired, records))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
