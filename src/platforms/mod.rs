//! Exchange integrations.
//!
//! Defines the `ExchangeGateway` trait through which wagers reach a real
//! exchange, and provides the Betfair Exchange implementation.

pub mod betfair;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{PlacementReceipt, Wager};

/// Abstraction over betting exchanges.
///
/// Each call places exactly one wager; the caller decides how to handle a
/// failure. The strategy engine never sees gateway results.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    /// Place a straight-up wager on the given market.
    async fn place_wager(&self, market_id: &str, wager: &Wager) -> Result<PlacementReceipt>;
}
