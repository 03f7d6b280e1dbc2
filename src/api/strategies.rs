//! Strategy definition CRUD.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Local;
use serde::Serialize;
use serde_json::json;

use super::{with_store, ApiResult, AppState};
use crate::strategy::patterns::Stake;
use crate::strategy::{StrategyDefinition, StrategyKind};
use crate::storage::{StrategyDraft, StrategyPatch};

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StrategyView {
    #[serde(flatten)]
    pub definition: StrategyDefinition,
    /// Active flag and schedule window checked against the local clock.
    pub is_active_now: bool,
}

impl From<StrategyDefinition> for StrategyView {
    fn from(definition: StrategyDefinition) -> Self {
        let is_active_now = definition.is_active_at(Local::now().naive_local());
        Self {
            definition,
            is_active_now,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyTypeView {
    pub id: &'static str,
    pub name: &'static str,
    pub stakes: &'static [Stake],
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/strategy-types
pub async fn list_types() -> Json<Vec<StrategyTypeView>> {
    Json(
        StrategyKind::ALL
            .iter()
            .map(|kind| StrategyTypeView {
                id: kind.id(),
                name: kind.display_name(),
                stakes: kind.stakes(),
            })
            .collect(),
    )
}

/// GET /api/strategies
pub async fn list_strategies(State(state): State<AppState>) -> Json<Vec<StrategyView>> {
    let store = state.strategies.read().await;
    Json(store.list().into_iter().map(StrategyView::from).collect())
}

/// POST /api/strategies
pub async fn create_strategy(
    State(state): State<AppState>,
    Json(draft): Json<StrategyDraft>,
) -> ApiResult<(StatusCode, Json<StrategyView>)> {
    let created = with_store(&state, move |store| store.insert(draft)).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /api/strategies/:id
pub async fn get_strategy(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<StrategyView>> {
    let store = state.strategies.read().await;
    Ok(Json(store.get(id)?.clone().into()))
}

/// PUT /api/strategies/:id
pub async fn update_strategy(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(patch): Json<StrategyPatch>,
) -> ApiResult<Json<StrategyView>> {
    let updated = with_store(&state, move |store| store.update(id, patch)).await?;
    Ok(Json(updated.into()))
}

/// DELETE /api/strategies/:id
pub async fn delete_strategy(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<serde_json::Value>> {
    let removed = with_store(&state, move |store| store.remove(id)).await?;
    Ok(Json(json!({
        "message": format!("Strategy '{}' deleted", removed.name),
        "id": removed.id,
    })))
}

/// POST /api/strategies/:id/toggle
pub async fn toggle_strategy(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<Json<StrategyView>> {
    let toggled = with_store(&state, move |store| store.toggle(id)).await?;
    Ok(Json(toggled.into()))
}
