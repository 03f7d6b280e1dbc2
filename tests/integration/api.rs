//! HTTP API wired to a live (mock) exchange.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use lc_automator::api::{build_router, ApiState};
use lc_automator::config::AppConfig;
use lc_automator::engine::executor::Executor;
use lc_automator::storage::StrategyStore;

use crate::mock_exchange::MockExchange;

fn make_app(exchange: &MockExchange) -> Router {
    let mut config = AppConfig::default();
    config.automation.dry_run = false;

    let executor = Arc::new(Executor::new(Some(Arc::new(exchange.clone())), false));
    let store = StrategyStore::in_memory(config.automation.unknown_strategy_policy);
    build_router(Arc::new(ApiState::new(store, executor, None, &config)))
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
    let resp = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();

    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 10_000_000).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_full_automation_round() {
    let exchange = MockExchange::new();
    let app = make_app(&exchange);

    let (status, _) = call(
        &app,
        Method::POST,
        "/api/strategies",
        Some(json!({
            "name": "Terminal 8 at 5",
            "strategy_type": "terminal_8",
            "config": { "chip_value": 5, "betting_houses": ["betfair"] },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, session) = call(
        &app,
        Method::POST,
        "/api/sessions",
        Some(json!({ "betting_house": "betfair", "market_id": "1.777" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let spins_uri = format!("/api/sessions/{}/spins", session["id"].as_str().unwrap());

    for n in [1, 6, 8] {
        let (status, _) = call(&app, Method::POST, &spins_uri, Some(json!({ "winning_number": n }))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let orders = exchange.orders();
    assert_eq!(orders.len(), 10);
    assert!(orders.iter().all(|o| o.market_id == "1.777"));
    assert_eq!(exchange.total_staked(), dec!(55));

    let (_, outcome) = call(&app, Method::POST, &spins_uri, Some(json!({ "winning_number": 30 }))).await;
    let profit: f64 = outcome["settled"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["profit"].as_f64().unwrap())
        .sum();
    // 10 chips on 30 win 350, the other nine lose 5 each
    assert_eq!(profit, 305.0);

    let (status, listed) = call(&app, Method::GET, "/api/sessions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["stats"]["wagers_won"], 1);
}

#[tokio::test]
async fn test_unknown_route() {
    let app = make_app(&MockExchange::new());
    let (status, _) = call(&app, Method::GET, "/api/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
