//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (exchange credentials) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::strategy::UnknownStrategyPolicy;
use crate::types::DEFAULT_HISTORY_WINDOW;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub automation: AutomationConfig,
    #[serde(default)]
    pub betfair: BetfairConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AutomationConfig {
    /// Spins kept per session for evaluation.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
    /// Log wagers instead of sending them to the exchange.
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default)]
    pub unknown_strategy_policy: UnknownStrategyPolicy,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            history_window: DEFAULT_HISTORY_WINDOW,
            dry_run: true,
            unknown_strategy_policy: UnknownStrategyPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BetfairConfig {
    pub enabled: bool,
    pub app_key_env: String,
    pub username_env: String,
    pub password_env: String,
    /// Decimal odds requested on every back order.
    pub back_price: Decimal,
    /// Selection id of pocket 0; pockets 1–36 follow contiguously.
    pub selection_id_base: u64,
    pub timeout_secs: u64,
}

impl Default for BetfairConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            app_key_env: "BETFAIR_APP_KEY".to_string(),
            username_env: "BETFAIR_USERNAME".to_string(),
            password_env: "BETFAIR_PASSWORD".to_string(),
            back_price: dec!(36.0),
            selection_id_base: 47972,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    pub default_spins: usize,
    /// Upper bound on spins a single request may ask for.
    pub max_spins: usize,
    /// Fixed wheel seed; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            default_spins: 1000,
            max_spins: 100_000,
            seed: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// JSON file holding strategy definitions. In-memory only when absent.
    #[serde(default)]
    pub strategies_path: Option<PathBuf>,
}

fn default_history_window() -> usize {
    DEFAULT_HISTORY_WINDOW
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.automation.history_window < 3 {
            anyhow::bail!(
                "automation.history_window must be at least 3, got {}",
                self.automation.history_window
            );
        }
        if self.betfair.back_price <= Decimal::ONE {
            anyhow::bail!(
                "betfair.back_price must be above 1.0, got {}",
                self.betfair.back_price
            );
        }
        if self.simulation.default_spins > self.simulation.max_spins {
            anyhow::bail!("simulation.default_spins exceeds simulation.max_spins");
        }
        Ok(())
    }
}
