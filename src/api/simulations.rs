//! Simulation endpoints.
//!
//! Simulations are CPU-bound, so they run on the blocking pool.

use axum::{
    extract::{Query, State},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{ApiError, ApiResult, AppState};
use crate::simulation::{SimulationReport, Simulator};
use crate::strategy::{StrategyConfig, StrategyKind};

#[derive(Debug, Deserialize)]
pub struct SimulationRequest {
    pub strategy_type: String,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub num_spins: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    #[serde(default)]
    pub num_spins: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub chip_value: Option<Decimal>,
}

fn spin_count(state: &AppState, requested: Option<usize>) -> ApiResult<usize> {
    let spins = requested.unwrap_or(state.simulation.default_spins);
    if spins == 0 || spins > state.simulation.max_spins {
        return Err(ApiError::BadRequest(format!(
            "num_spins must be between 1 and {}, got {spins}",
            state.simulation.max_spins
        )));
    }
    Ok(spins)
}

fn simulator(state: &AppState, seed: Option<u64>) -> Simulator {
    Simulator::new(state.history_window, seed.or(state.simulation.seed))
}

/// POST /api/simulations
pub async fn run_simulation(
    State(state): State<AppState>,
    Json(req): Json<SimulationRequest>,
) -> ApiResult<Json<SimulationReport>> {
    let kind: StrategyKind = req.strategy_type.parse()?;
    let config = StrategyConfig::from_value(req.config)?;
    let num_spins = spin_count(&state, req.num_spins)?;
    let simulator = simulator(&state, req.seed);

    let report = tokio::task::spawn_blocking(move || simulator.run(kind, &config, num_spins))
        .await
        .map_err(|e| ApiError::Internal(format!("Simulation task failed: {e}")))?;
    Ok(Json(report))
}

/// GET /api/simulations/compare
pub async fn compare_strategies(
    State(state): State<AppState>,
    Query(query): Query<CompareQuery>,
) -> ApiResult<Json<Vec<SimulationReport>>> {
    let config = match query.chip_value {
        Some(chip) => StrategyConfig::with_chip_value(chip),
        None => StrategyConfig::default(),
    };
    config.validate()?;
    let num_spins = spin_count(&state, query.num_spins)?;
    let simulator = simulator(&state, query.seed);

    let reports = tokio::task::spawn_blocking(move || simulator.compare(&config, num_spins))
        .await
        .map_err(|e| ApiError::Internal(format!("Simulation task failed: {e}")))?;
    Ok(Json(reports))
}
