//! Schedule status, presets and bulk updates.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{with_store, ApiError, ApiResult, AppState};
use crate::strategy::schedule::{self, Schedule, SchedulePreset, ScheduleUpdate};

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleStatus {
    pub id: u64,
    pub name: String,
    pub active: bool,
    pub schedule_enabled: bool,
    pub is_active_now: bool,
    pub schedule: Schedule,
}

#[derive(Debug, Serialize)]
pub struct ScheduleStatusResponse {
    pub current_time: String,
    pub strategies: Vec<ScheduleStatus>,
}

/// GET /api/schedule/status
pub async fn get_status(State(state): State<AppState>) -> Json<ScheduleStatusResponse> {
    let now = Local::now();
    let naive = now.naive_local();
    let store = state.strategies.read().await;

    let strategies = store
        .list()
        .into_iter()
        .map(|s| ScheduleStatus {
            id: s.id,
            is_active_now: s.is_active_at(naive),
            active: s.active,
            schedule_enabled: s.schedule.enabled,
            name: s.name,
            schedule: s.schedule,
        })
        .collect();

    Json(ScheduleStatusResponse {
        current_time: now.to_rfc3339(),
        strategies,
    })
}

/// GET /api/schedule/presets
pub async fn get_presets() -> Json<Vec<SchedulePreset>> {
    Json(schedule::presets())
}

#[derive(Debug, Deserialize)]
pub struct ApplyPresetRequest {
    pub preset_name: String,
    /// Empty or absent applies to every strategy.
    #[serde(default)]
    pub strategy_ids: Vec<u64>,
}

/// POST /api/schedule/apply-preset
pub async fn apply_preset(
    State(state): State<AppState>,
    Json(req): Json<ApplyPresetRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let preset = schedule::preset(&req.preset_name)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown preset: {}", req.preset_name)))?;

    let preset_schedule = preset.schedule.clone();
    let updated_count = with_store(&state, move |store| {
        store.apply_schedule(&req.strategy_ids, |s| *s = preset_schedule.clone())
    })
    .await?;

    Ok(Json(json!({
        "message": format!("Preset '{}' applied to {updated_count} strategies", preset.name),
        "preset_applied": preset.key,
        "updated_count": updated_count,
    })))
}

#[derive(Debug, Deserialize)]
pub struct BulkUpdateRequest {
    #[serde(default)]
    pub strategy_ids: Vec<u64>,
    pub schedule_settings: ScheduleUpdate,
}

/// PUT /api/schedule/bulk-update
pub async fn bulk_update(
    State(state): State<AppState>,
    Json(req): Json<BulkUpdateRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let updated_count = with_store(&state, move |store| {
        store.apply_schedule(&req.strategy_ids, |s| s.apply(&req.schedule_settings))
    })
    .await?;

    Ok(Json(json!({
        "message": format!("Schedule updated for {updated_count} strategies"),
        "updated_count": updated_count,
    })))
}

/// PUT /api/schedule/strategy/:id
pub async fn update_strategy_schedule(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(update): Json<ScheduleUpdate>,
) -> ApiResult<Json<ScheduleStatus>> {
    let strategy = with_store(&state, move |store| {
        store.apply_schedule(&[id], |s| s.apply(&update))?;
        Ok(store.get(id)?.clone())
    })
    .await?;

    Ok(Json(ScheduleStatus {
        id,
        name: strategy.name.clone(),
        active: strategy.active,
        schedule_enabled: strategy.schedule.enabled,
        is_active_now: strategy.is_active_at(Local::now().naive_local()),
        schedule: strategy.schedule.clone(),
    }))
}
