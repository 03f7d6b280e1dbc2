//! Read-only exchange queries: roulette markets, books and live orders.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{ApiError, ApiResult, AppState};
use crate::platforms::betfair::{BetfairClient, ExchangeOrder, RouletteBook, RouletteMarket};

#[derive(Debug, Serialize)]
pub struct ExchangeStatus {
    pub enabled: bool,
    pub logged_in: bool,
    pub dry_run: bool,
}

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    #[serde(default)]
    pub market_id: Option<String>,
}

fn client(state: &AppState) -> ApiResult<Arc<BetfairClient>> {
    state
        .betfair
        .clone()
        .ok_or_else(|| ApiError::Unavailable("Betfair integration is not enabled".to_string()))
}

/// GET /api/exchange/status
pub async fn get_status(State(state): State<AppState>) -> Json<ExchangeStatus> {
    let logged_in = match &state.betfair {
        Some(client) => client.is_logged_in().await,
        None => false,
    };
    Json(ExchangeStatus {
        enabled: state.betfair.is_some(),
        logged_in,
        dry_run: state.executor.is_dry_run(),
    })
}

/// GET /api/exchange/markets
pub async fn list_markets(State(state): State<AppState>) -> ApiResult<Json<Vec<RouletteMarket>>> {
    let client = client(&state)?;
    Ok(Json(client.list_roulette_markets().await?))
}

/// GET /api/exchange/markets/:id
pub async fn get_market_book(
    State(state): State<AppState>,
    Path(market_id): Path<String>,
) -> ApiResult<Json<RouletteBook>> {
    let client = client(&state)?;
    client
        .market_book(&market_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Market not found: {market_id}")))
}

/// GET /api/exchange/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> ApiResult<Json<Vec<ExchangeOrder>>> {
    let client = client(&state)?;
    Ok(Json(client.current_orders(query.market_id.as_deref()).await?))
}
