//! Wager executor.
//!
//! Sends wagers to the exchange gateway one at a time and tracks which
//! were placed and which failed. A failure on one wager never stops the
//! rest of the batch.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::platforms::ExchangeGateway;
use crate::types::{PlacementReceipt, Wager};

pub const DRY_RUN_PLATFORM: &str = "dry-run";

// ---------------------------------------------------------------------------
// Execution result
// ---------------------------------------------------------------------------

/// Result of executing a batch of wagers.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    pub placed: Vec<PlacedWager>,
    pub failed: Vec<FailedWager>,
    pub total_staked: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlacedWager {
    pub wager: Wager,
    pub receipt: PlacementReceipt,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedWager {
    pub wager: Wager,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct Executor {
    gateway: Option<Arc<dyn ExchangeGateway>>,
    dry_run: bool,
}

impl Executor {
    pub fn new(gateway: Option<Arc<dyn ExchangeGateway>>, dry_run: bool) -> Self {
        Self { gateway, dry_run }
    }

    /// Executor that only logs and fabricates receipts.
    pub fn dry_run() -> Self {
        Self::new(None, true)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Place one wager.
    ///
    /// In dry-run mode, logs and returns a synthetic receipt without
    /// touching the gateway.
    pub async fn execute_one(&self, market_id: &str, wager: &Wager) -> Result<PlacementReceipt> {
        if self.dry_run {
            info!(
                market_id = %market_id,
                number = wager.number,
                amount = %wager.amount,
                "[DRY RUN] Would place wager"
            );
            return Ok(PlacementReceipt::dry_run(market_id, wager));
        }

        let gateway = self
            .gateway
            .as_ref()
            .context("No exchange gateway configured")?;

        gateway
            .place_wager(market_id, wager)
            .await
            .with_context(|| format!("Placing {wager} on {market_id} failed"))
    }

    /// Execute a batch of wagers independently.
    pub async fn execute(&self, market_id: &str, wagers: &[Wager]) -> ExecutionReport {
        let mut report = ExecutionReport::default();

        if wagers.is_empty() {
            return report;
        }

        info!(
            count = wagers.len(),
            market_id = %market_id,
            dry_run = self.dry_run,
            "Executing batch"
        );

        for wager in wagers {
            match self.execute_one(market_id, wager).await {
                Ok(receipt) => {
                    report.total_staked += wager.amount;
                    report.placed.push(PlacedWager {
                        wager: wager.clone(),
                        receipt,
                    });
                }
                Err(e) => {
                    let reason = format!("{e:#}");
                    warn!(
                        market_id = %market_id,
                        number = wager.number,
                        error = %reason,
                        "Wager placement failed"
                    );
                    report.failed.push(FailedWager {
                        wager: wager.clone(),
                        reason,
                    });
                }
            }
        }

        info!(
            placed = report.placed.len(),
            failed = report.failed.len(),
            staked = format!("{:.2}", report.total_staked),
            "Batch execution complete"
        );

        report
    }
}

// ---------------------------------------------------------------------------
// PlacementReceipt helpers
// ---------------------------------------------------------------------------

impl PlacementReceipt {
    /// Create a dry-run receipt (no real execution).
    pub fn dry_run(market_id: &str, wager: &Wager) -> Self {
        Self {
            order_id: format!("dry-run-{}", uuid::Uuid::new_v4()),
            market_id: market_id.to_string(),
            platform: DRY_RUN_PLATFORM.to_string(),
            number: wager.number,
            amount: wager.amount,
            price: Decimal::ZERO,
            size_matched: Decimal::ZERO,
            timestamp: chrono::Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
