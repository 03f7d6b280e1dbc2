//! LC Automator: roulette strategy automation service.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the strategy store, connects the exchange when enabled and
//! serves the HTTP API until Ctrl+C, then stops every session cleanly.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use lc_automator::api::{self, ApiState};
use lc_automator::config;
use lc_automator::engine::executor::Executor;
use lc_automator::platforms::betfair::BetfairClient;
use lc_automator::platforms::ExchangeGateway;
use lc_automator::storage::StrategyStore;

const BANNER: &str = r#"
 _     ____       _         _                        _
| |   / ___|     / \  _   _| |_ ___  _ __ ___   __ _| |_ ___  _ __
| |  | |   _____/ _ \| | | | __/ _ \| '_ ` _ \ / _` | __/ _ \| '__|
| |__| |__|_____/ ___ \ |_| | || (_) | | | | | | (_| | || (_) | |
|_____\____|   /_/   \_\__,_|\__\___/|_| |_| |_|\__,_|\__\___/|_|

  Live casino roulette strategy automation
"#;

const CONFIG_PATH_ENV: &str = "LC_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        config = %config_path,
        dry_run = cfg.automation.dry_run,
        history_window = cfg.automation.history_window,
        betfair = cfg.betfair.enabled,
        "LC Automator starting up"
    );

    // -- Strategy store --------------------------------------------------

    let policy = cfg.automation.unknown_strategy_policy;
    let store = match &cfg.storage.strategies_path {
        Some(path) => StrategyStore::open(path, policy)?,
        None => {
            warn!("No strategies_path configured, definitions will not be saved");
            StrategyStore::in_memory(policy)
        }
    };
    info!(count = store.len(), "Strategies loaded");

    // -- Exchange --------------------------------------------------------

    let betfair = if cfg.betfair.enabled {
        let client = Arc::new(BetfairClient::from_config(&cfg.betfair)?);
        if let Err(e) = client.login().await {
            // Placement retries the login, so the service still starts
            error!(error = format!("{e:#}"), "Betfair login failed");
        }
        Some(client)
    } else {
        None
    };

    let gateway: Option<Arc<dyn ExchangeGateway>> = betfair
        .clone()
        .map(|client| client as Arc<dyn ExchangeGateway>);
    if !cfg.automation.dry_run && gateway.is_none() {
        warn!("dry_run is off but no exchange is enabled; every wager will fail");
    }
    let executor = Arc::new(Executor::new(gateway, cfg.automation.dry_run));

    // -- API -------------------------------------------------------------

    let state = Arc::new(ApiState::new(store, executor, betfair.clone(), &cfg));

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid server address {}:{}",
                cfg.server.host, cfg.server.port
            )
        })?;

    info!("Serving API. Press Ctrl+C to stop.");
    api::serve(Arc::clone(&state), addr, shutdown_signal()).await?;

    // -- Shutdown --------------------------------------------------------

    let stopped = state.sessions.stop_all().await;
    for snapshot in &stopped {
        info!(
            session_id = %snapshot.id,
            spins = snapshot.stats.spins,
            profit = %snapshot.stats.total_profit,
            open_wagers = snapshot.open_wagers.len(),
            "Session closed"
        );
    }

    if let Some(client) = &betfair {
        if let Err(e) = client.logout().await {
            warn!(error = format!("{e:#}"), "Betfair logout failed");
        }
    }

    info!(sessions = stopped.len(), "LC Automator shut down cleanly.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("lc_automator=info,tower_http=warn"));

    let json_logging = std::env::var("LC_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
