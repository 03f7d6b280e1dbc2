//! Mock exchange for integration testing.
//!
//! Provides a deterministic `ExchangeGateway` that records every order and
//! rejects configured pockets, all in-memory with no external dependencies.

use anyhow::{bail, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use lc_automator::platforms::ExchangeGateway;
use lc_automator::types::{PlacementReceipt, Wager};

/// An in-memory exchange. Clones share the same order book.
#[derive(Clone, Default)]
pub struct MockExchange {
    orders: Arc<Mutex<Vec<PlacementReceipt>>>,
    rejected: Arc<Mutex<HashSet<u8>>>,
    /// If set, every order fails with this message.
    force_error: Arc<Mutex<Option<String>>>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject any order on `number`.
    pub fn reject_number(&self, number: u8) {
        self.rejected.lock().unwrap().insert(number);
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn orders(&self) -> Vec<PlacementReceipt> {
        self.orders.lock().unwrap().clone()
    }

    pub fn total_staked(&self) -> Decimal {
        self.orders.lock().unwrap().iter().map(|o| o.amount).sum()
    }
}

#[async_trait]
impl ExchangeGateway for MockExchange {
    async fn place_wager(&self, market_id: &str, wager: &Wager) -> Result<PlacementReceipt> {
        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            bail!(msg);
        }
        if self.rejected.lock().unwrap().contains(&wager.number) {
            bail!("INVALID_RUNNER: pocket {} suspended", wager.number);
        }

        let mut orders = self.orders.lock().unwrap();
        let receipt = PlacementReceipt {
            order_id: format!("mock-{}", orders.len() + 1),
            market_id: market_id.to_string(),
            platform: "mock".to_string(),
            number: wager.number,
            amount: wager.amount,
            price: dec!(36),
            size_matched: wager.amount,
            timestamp: chrono::Utc::now(),
        };
        orders.push(receipt.clone());
        Ok(receipt)
    }
}

#[tokio::test]
async fn test_mock_records_orders() {
    let exchange = MockExchange::new();
    exchange.reject_number(0);

    assert!(exchange
        .place_wager("1.1", &Wager::new(5, dec!(2)))
        .await
        .is_ok());
    assert!(exchange
        .place_wager("1.1", &Wager::new(0, dec!(2)))
        .await
        .is_err());

    exchange.set_error("SERVICE_UNAVAILABLE");
    assert!(exchange
        .place_wager("1.1", &Wager::new(5, dec!(2)))
        .await
        .is_err());
    exchange.clear_error();

    assert_eq!(exchange.orders().len(), 1);
    assert_eq!(exchange.total_staked(), dec!(2));
}
