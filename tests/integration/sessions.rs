//! Live sessions driven end to end against the mock exchange.

use chrono::Utc;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio_test::assert_ok;

use lc_automator::engine::executor::Executor;
use lc_automator::engine::session::{SessionParams, SessionRegistry};
use lc_automator::storage::{StrategyDraft, StrategyStore};
use lc_automator::strategy::schedule::Schedule;
use lc_automator::strategy::{
    EvaluationRecord, StrategyConfig, StrategyDefinition, UnknownStrategyPolicy,
};
use lc_automator::types::WagerStatus;

use crate::mock_exchange::MockExchange;

fn make_definition(id: u64, strategy_type: &str) -> StrategyDefinition {
    StrategyDefinition {
        id,
        name: strategy_type.to_string(),
        strategy_type: strategy_type.to_string(),
        active: true,
        config: StrategyConfig {
            betting_houses: ["betfair".to_string()].into_iter().collect(),
            ..StrategyConfig::default()
        },
        schedule: Schedule::default(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn make_params(strategies: Vec<StrategyDefinition>) -> SessionParams {
    SessionParams {
        betting_house: "betfair".to_string(),
        market_id: "1.987".to_string(),
        strategies,
        history_window: 20,
        initial_history: Vec::new(),
    }
}

fn live_registry(exchange: &MockExchange, policy: UnknownStrategyPolicy) -> SessionRegistry {
    let executor = Executor::new(Some(Arc::new(exchange.clone())), false);
    SessionRegistry::new(Arc::new(executor), policy)
}

#[tokio::test]
async fn test_orders_reach_exchange_and_settle() {
    let exchange = MockExchange::new();
    let registry = live_registry(&exchange, UnknownStrategyPolicy::Reject);
    let handle = assert_ok!(
        registry
            .start(make_params(vec![
                make_definition(1, "3x3_pattern"),
                make_definition(2, "2x7_pattern"),
            ]))
            .await
    );

    // 4, 12, 28 are targets of both patterns
    for n in [4, 12] {
        let outcome = assert_ok!(handle.record_spin(n).await);
        assert!(outcome.placed.is_empty());
    }
    let outcome = assert_ok!(handle.record_spin(28).await);
    assert_eq!(outcome.placed.len(), 11 + 14);
    assert_eq!(exchange.orders().len(), 25);
    assert_eq!(exchange.total_staked(), dec!(26));
    assert!(outcome
        .placed
        .iter()
        .all(|w| w.order_id.as_deref().is_some_and(|id| id.starts_with("mock-"))));

    // 19 is covered once by each pattern
    let outcome = assert_ok!(handle.record_spin(19).await);
    assert_eq!(outcome.settled.len(), 25);
    let won = outcome
        .settled
        .iter()
        .filter(|s| s.status == WagerStatus::Won)
        .count();
    assert_eq!(won, 2);

    let snapshot = assert_ok!(handle.snapshot().await);
    assert_eq!(snapshot.stats.total_staked, dec!(26));
    // Two one-chip wins at 35:1; the 23 losers carry 24 chips
    assert_eq!(snapshot.stats.total_profit, dec!(70) - dec!(24));
    // The latest spin triggers both patterns again: [19, 28, 12]
    assert_eq!(snapshot.open_wagers.len(), 25);
}

#[tokio::test]
async fn test_rejected_pocket_marked_failed() {
    let exchange = MockExchange::new();
    exchange.reject_number(30);
    let registry = live_registry(&exchange, UnknownStrategyPolicy::Reject);

    let mut params = make_params(vec![make_definition(1, "terminal_8")]);
    params.initial_history = vec![6, 1];
    let handle = assert_ok!(registry.start(params).await);

    let outcome = assert_ok!(handle.record_spin(8).await);
    assert_eq!(outcome.placed.len(), 9);
    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].wager.number, 30);
    assert!(outcome.failed[0]
        .failure
        .as_deref()
        .is_some_and(|f| f.contains("INVALID_RUNNER")));

    let snapshot = assert_ok!(handle.snapshot().await);
    assert_eq!(snapshot.stats.wagers_placed, 9);
    assert_eq!(snapshot.stats.wagers_failed, 1);
    assert_eq!(snapshot.open_wagers.len(), 9);
}

#[tokio::test]
async fn test_exchange_outage_places_nothing() {
    let exchange = MockExchange::new();
    exchange.set_error("SERVICE_UNAVAILABLE");
    let registry = live_registry(&exchange, UnknownStrategyPolicy::Reject);

    let handle = assert_ok!(
        registry
            .start(make_params(vec![make_definition(1, "terminal_8")]))
            .await
    );
    for n in [1, 6] {
        assert_ok!(handle.record_spin(n).await);
    }
    let outcome = assert_ok!(handle.record_spin(8).await);
    assert!(outcome.placed.is_empty());
    assert_eq!(outcome.failed.len(), 10);
    assert!(exchange.orders().is_empty());

    let outcome = assert_ok!(handle.record_spin(30).await);
    assert!(outcome.settled.is_empty());
}

#[tokio::test]
async fn test_ignore_policy_skips_unknown_type() {
    let exchange = MockExchange::new();
    let registry = live_registry(&exchange, UnknownStrategyPolicy::Ignore);
    let handle = assert_ok!(
        registry
            .start(make_params(vec![
                make_definition(1, "martingale"),
                make_definition(2, "terminal_8"),
            ]))
            .await
    );

    let outcome = assert_ok!(handle.record_spin(3).await);
    assert!(outcome.evaluations.contains(&EvaluationRecord::Unknown {
        strategy_id: 1,
        strategy_type: "martingale".to_string(),
    }));
}

#[tokio::test]
async fn test_store_drives_house_selection() {
    let mut store = StrategyStore::in_memory(UnknownStrategyPolicy::Reject);
    for (strategy_type, house) in [("terminal_8", "betfair"), ("2x7_pattern", "sportingbet")] {
        assert_ok!(store.insert(StrategyDraft {
            name: strategy_type.to_string(),
            strategy_type: strategy_type.to_string(),
            config: serde_json::json!({ "betting_houses": [house] }),
            active: true,
            schedule: None,
        }));
    }

    let exchange = MockExchange::new();
    let registry = live_registry(&exchange, UnknownStrategyPolicy::Reject);
    let handle = assert_ok!(
        registry
            .start(make_params(store.for_house("betfair")))
            .await
    );
    let snapshot = assert_ok!(handle.snapshot().await);
    assert_eq!(snapshot.strategy_ids, vec![1]);

    let stopped = registry.stop_all().await;
    assert_eq!(stopped.len(), 1);
    assert!(!stopped[0].running);
}
