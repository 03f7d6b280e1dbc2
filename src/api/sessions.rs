//! Live automation sessions.
//!
//! Spin results are pushed in by the client; each push settles the
//! previous round and may place new wagers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{ApiResult, AppState};
use crate::engine::session::{SessionParams, SessionSnapshot, SpinOutcome};

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub betting_house: String,
    pub market_id: String,
    /// Strategies to run. When absent, every active strategy enabled for
    /// the betting house.
    #[serde(default)]
    pub strategy_ids: Option<Vec<u64>>,
    /// Spins already seen at the table, most recent first.
    #[serde(default)]
    pub initial_history: Vec<u8>,
    #[serde(default)]
    pub history_window: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct SpinRequest {
    pub winning_number: u8,
}

/// GET /api/sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSnapshot>> {
    Json(state.sessions.list().await)
}

/// POST /api/sessions
pub async fn start_session(
    State(state): State<AppState>,
    Json(req): Json<StartSessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionSnapshot>)> {
    let strategies = {
        let store = state.strategies.read().await;
        match &req.strategy_ids {
            Some(ids) => store.get_many(ids)?,
            None => store.for_house(&req.betting_house),
        }
    };

    let handle = state
        .sessions
        .start(SessionParams {
            betting_house: req.betting_house,
            market_id: req.market_id,
            strategies,
            history_window: req.history_window.unwrap_or(state.history_window),
            initial_history: req.initial_history,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(handle.snapshot().await?)))
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionSnapshot>> {
    let handle = state.sessions.get(id).await?;
    Ok(Json(handle.snapshot().await?))
}

/// POST /api/sessions/:id/spins
pub async fn record_spin(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SpinRequest>,
) -> ApiResult<Json<SpinOutcome>> {
    let handle = state.sessions.get(id).await?;
    Ok(Json(handle.record_spin(req.winning_number).await?))
}

/// DELETE /api/sessions/:id
pub async fn stop_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<SessionSnapshot>> {
    Ok(Json(state.sessions.stop(id).await?))
}
