//! HTTP API: Axum server for strategy management, evaluation, simulation
//! and live sessions.
//!
//! All endpoints return JSON. Errors are `{ "error": "..." }` with a 4xx
//! or 5xx status. CORS enabled for the browser frontend.

pub mod evaluate;
pub mod exchange;
pub mod schedule;
pub mod sessions;
pub mod simulations;
pub mod strategies;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::{AppConfig, SimulationConfig};
use crate::engine::executor::Executor;
use crate::engine::session::SessionRegistry;
use crate::platforms::betfair::BetfairClient;
use crate::storage::StrategyStore;
use crate::types::{AutomatorError, StrategyError};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct ApiState {
    pub strategies: Arc<RwLock<StrategyStore>>,
    pub sessions: SessionRegistry,
    pub executor: Arc<Executor>,
    /// Direct exchange access for market and order queries.
    pub betfair: Option<Arc<BetfairClient>>,
    pub history_window: usize,
    pub simulation: SimulationConfig,
}

pub type AppState = Arc<ApiState>;

impl ApiState {
    pub fn new(
        store: StrategyStore,
        executor: Arc<Executor>,
        betfair: Option<Arc<BetfairClient>>,
        config: &AppConfig,
    ) -> Self {
        Self {
            strategies: Arc::new(RwLock::new(store)),
            sessions: SessionRegistry::new(
                Arc::clone(&executor),
                config.automation.unknown_strategy_policy,
            ),
            executor,
            betfair,
            history_window: config.automation.history_window,
            simulation: config.simulation.clone(),
        }
    }
}

/// Run a store mutation on the blocking pool, holding the write lock until
/// its file write has finished.
pub(crate) async fn with_store<T, F>(state: &AppState, change: F) -> ApiResult<T>
where
    F: FnOnce(&mut StrategyStore) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let mut store = Arc::clone(&state.strategies).write_owned().await;
    tokio::task::spawn_blocking(move || change(&mut *store))
        .await
        .map_err(|e| ApiError::Internal(format!("Store task failed: {e}")))?
        .map_err(ApiError::from)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error returned by handlers, rendered as `{ "error": message }`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StrategyError> for ApiError {
    fn from(e: StrategyError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<AutomatorError> for ApiError {
    fn from(e: AutomatorError) -> Self {
        match e {
            AutomatorError::InvalidSpin(_)
            | AutomatorError::Strategy(_)
            | AutomatorError::Config(_) => ApiError::BadRequest(e.to_string()),
            AutomatorError::StrategyNotFound(_)
            | AutomatorError::SessionNotFound(_)
            | AutomatorError::SessionClosed(_) => ApiError::NotFound(e.to_string()),
            AutomatorError::Exchange { .. } => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<AutomatorError>() {
            Ok(domain) => domain.into(),
            Err(e) => match e.downcast::<StrategyError>() {
                Ok(strategy) => strategy.into(),
                Err(e) => ApiError::Internal(format!("{e:#}")),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = %status, error = %self, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        // Strategies
        .route("/api/strategy-types", get(strategies::list_types))
        .route(
            "/api/strategies",
            get(strategies::list_strategies).post(strategies::create_strategy),
        )
        .route(
            "/api/strategies/:id",
            get(strategies::get_strategy)
                .put(strategies::update_strategy)
                .delete(strategies::delete_strategy),
        )
        .route("/api/strategies/:id/toggle", post(strategies::toggle_strategy))
        // Stateless evaluation
        .route("/api/evaluate", post(evaluate::evaluate))
        .route("/api/settle", post(evaluate::settle_wager))
        // Schedules
        .route("/api/schedule/status", get(schedule::get_status))
        .route("/api/schedule/presets", get(schedule::get_presets))
        .route("/api/schedule/apply-preset", post(schedule::apply_preset))
        .route("/api/schedule/bulk-update", put(schedule::bulk_update))
        .route("/api/schedule/strategy/:id", put(schedule::update_strategy_schedule))
        // Simulation
        .route("/api/simulations", post(simulations::run_simulation))
        .route("/api/simulations/compare", get(simulations::compare_strategies))
        // Live sessions
        .route(
            "/api/sessions",
            get(sessions::list_sessions).post(sessions::start_session),
        )
        .route(
            "/api/sessions/:id",
            get(sessions::get_session).delete(sessions::stop_session),
        )
        .route("/api/sessions/:id/spins", post(sessions::record_spin))
        // Exchange
        .route("/api/exchange/status", get(exchange::get_status))
        .route("/api/exchange/markets", get(exchange::list_markets))
        .route("/api/exchange/markets/:id", get(exchange::get_market_book))
        .route("/api/exchange/orders", get(exchange::list_orders))
        .layer(cors)
        .with_state(state)
}

/// Serve the API until `shutdown` resolves.
pub async fn serve(
    state: AppState,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API address {addr}"))?;
    info!(%addr, "API server listening on http://{addr}");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("API server error")
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::strategy::UnknownStrategyPolicy;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    pub(crate) fn test_state() -> AppState {
        Arc::new(ApiState::new(
            StrategyStore::in_memory(UnknownStrategyPolicy::Reject),
            Arc::new(Executor::dry_run()),
            None,
            &AppConfig::default(),
        ))
    }

    /// Send one request and decode the JSON response.
    pub(crate) async fn send(
        state: &AppState,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let resp = build_router(Arc::clone(state)).oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000_000).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (status, body) = send(&test_state(), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(
            ApiError::from(AutomatorError::InvalidSpin(40)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AutomatorError::StrategyNotFound(3)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StrategyError::NotImplemented("gap".into())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_anyhow_downcast() {
        let wrapped = anyhow::Error::from(AutomatorError::StrategyNotFound(7));
        assert_eq!(ApiError::from(wrapped).status(), StatusCode::NOT_FOUND);

        let other = anyhow::anyhow!("disk full");
        let err = ApiError::from(other);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "disk full");
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let (status, body) = send(&test_state(), Method::GET, "/api/strategies/42", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Strategy not found: 42");
    }
}
