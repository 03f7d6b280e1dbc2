//! Shared types for the automator.
//!
//! These types form the data model used across all modules.
//! They are kept free of I/O so that the strategy engine, the exchange
//! layer and the HTTP surface can all depend on them.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Highest number on a single-zero wheel.
pub const MAX_NUMBER: u8 = 36;

/// Number of recent spins kept for strategy evaluation.
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

/// Whether `n` is a pocket on a single-zero wheel (0–36).
pub fn is_valid_number(n: u8) -> bool {
    n <= MAX_NUMBER
}

/// Convert an exchange float into a `Decimal`, falling back to zero for
/// NaN / infinity.
pub fn d(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

// ---------------------------------------------------------------------------
// Spin history
// ---------------------------------------------------------------------------

/// Rolling window of spin results, most recent first.
///
/// Recording a spin inserts it at index 0 and drops the oldest entries
/// beyond the window, so the most recent results are never lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinHistory {
    spins: Vec<u8>,
    window: usize,
}

impl SpinHistory {
    /// Empty history bounded to `window` entries (at least one).
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            spins: Vec::with_capacity(window),
            window,
        }
    }

    /// Build a history from spins already ordered most-recent-first.
    pub fn from_recent(spins: &[u8], window: usize) -> Result<Self, AutomatorError> {
        if let Some(&bad) = spins.iter().find(|n| !is_valid_number(**n)) {
            return Err(AutomatorError::InvalidSpin(bad));
        }
        let mut history = Self::new(window);
        history.spins.extend(spins.iter().take(history.window).copied());
        Ok(history)
    }

    /// Record a new winning number as the most recent spin.
    pub fn record(&mut self, number: u8) -> Result<(), AutomatorError> {
        if !is_valid_number(number) {
            return Err(AutomatorError::InvalidSpin(number));
        }
        self.spins.insert(0, number);
        self.spins.truncate(self.window);
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.spins
    }

    pub fn latest(&self) -> Option<u8> {
        self.spins.first().copied()
    }

    pub fn len(&self) -> usize {
        self.spins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spins.is_empty()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

impl Default for SpinHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl fmt::Display for SpinHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let spins: Vec<String> = self.spins.iter().map(|n| n.to_string()).collect();
        write!(f, "[{}]", spins.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Wagers
// ---------------------------------------------------------------------------

/// A straight-up stake on a single number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Wager {
    pub number: u8,
    pub amount: Decimal,
}

impl Wager {
    pub fn new(number: u8, amount: Decimal) -> Self {
        Self { number, amount }
    }
}

impl fmt::Display for Wager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} on {}", self.amount, self.number)
    }
}

/// Lifecycle of a wager from generation to settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WagerStatus {
    Pending,
    Placed,
    Failed,
    Won,
    Lost,
}

impl WagerStatus {
    /// Whether the wager has reached a final state.
    pub fn is_settled(&self) -> bool {
        matches!(self, WagerStatus::Won | WagerStatus::Lost)
    }
}

impl fmt::Display for WagerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WagerStatus::Pending => write!(f, "pending"),
            WagerStatus::Placed => write!(f, "placed"),
            WagerStatus::Failed => write!(f, "failed"),
            WagerStatus::Won => write!(f, "won"),
            WagerStatus::Lost => write!(f, "lost"),
        }
    }
}

/// Receipt returned after an exchange accepts a wager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementReceipt {
    /// Opaque identifier assigned by the exchange.
    pub order_id: String,
    pub market_id: String,
    pub platform: String,
    pub number: u8,
    pub amount: Decimal,
    /// Decimal odds requested (or matched) for the order.
    pub price: Decimal,
    pub size_matched: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for PlacementReceipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {:.2} on {} @ {} (matched {:.2}) [{}]",
            self.platform,
            self.market_id,
            self.amount,
            self.number,
            self.price,
            self.size_matched,
            self.order_id,
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors raised while interpreting strategy definitions.
///
/// The evaluator itself never fails; these surface when a definition is
/// created, loaded or dispatched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrategyError {
    #[error("Unknown strategy type: {0}")]
    UnknownVariant(String),

    #[error("Invalid strategy config: {0}")]
    InvalidConfig(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

/// Domain-specific error types for the automator.
#[derive(Debug, thiserror::Error)]
pub enum AutomatorError {
    #[error("Spin result out of range: {0} (expected 0-36)")]
    InvalidSpin(u8),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error("Exchange error ({platform}): {message}")]
    Exchange { platform: String, message: String },

    #[error("Strategy not found: {0}")]
    StrategyNotFound(u64),

    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("Session {0} is no longer running")]
    SessionClosed(Uuid),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
