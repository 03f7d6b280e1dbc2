//! Stateless evaluation and settlement, for previews and manual checks.

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResult, AppState};
use crate::strategy::settlement::{settle, Settlement, MAX_STAKE};
use crate::strategy::{StrategyConfig, StrategyKind};
use crate::types::{is_valid_number, AutomatorError, SpinHistory, Wager};

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub strategy_type: String,
    /// Most recent spin first.
    pub history: Vec<u8>,
    #[serde(default)]
    pub config: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub strategy_type: StrategyKind,
    pub triggered: bool,
    pub wagers: Vec<Wager>,
    pub total_stake: Decimal,
}

/// POST /api/evaluate
pub async fn evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> ApiResult<Json<EvaluateResponse>> {
    let kind: StrategyKind = req.strategy_type.parse()?;
    let config = StrategyConfig::from_value(req.config)?;
    let history = SpinHistory::from_recent(&req.history, state.history_window)?;

    let result = kind.evaluate(history.as_slice(), &config);
    let total_stake = result.total_stake();
    Ok(Json(EvaluateResponse {
        strategy_type: kind,
        triggered: result.triggered,
        wagers: result.wagers,
        total_stake,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub numbers: Vec<u8>,
    pub amount: Decimal,
    pub winning_number: u8,
}

/// POST /api/settle
pub async fn settle_wager(Json(req): Json<SettleRequest>) -> ApiResult<Json<Settlement>> {
    if let Some(bad) = req
        .numbers
        .iter()
        .chain(std::iter::once(&req.winning_number))
        .find(|n| !is_valid_number(**n))
    {
        return Err(AutomatorError::InvalidSpin(*bad).into());
    }
    if req.amount <= Decimal::ZERO || req.amount > MAX_STAKE {
        return Err(ApiError::BadRequest(format!(
            "amount must be positive and at most {MAX_STAKE}, got {}",
            req.amount
        )));
    }
    Ok(Json(settle(&req.numbers, req.amount, req.winning_number)))
}
