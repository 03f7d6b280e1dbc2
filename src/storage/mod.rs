//! Strategy definition store.
//!
//! Keeps user-defined strategies in memory and, when a path is configured,
//! mirrors them to a pretty-printed JSON file after every change. A change
//! only becomes visible once its file write has succeeded. Only
//! definitions are stored here; wagers and results live in sessions.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::strategy::schedule::Schedule;
use crate::strategy::{StrategyConfig, StrategyDefinition, UnknownStrategyPolicy};
use crate::types::AutomatorError;

/// On-disk layout of the strategies file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StoredStrategies {
    pub next_id: u64,
    pub strategies: Vec<StrategyDefinition>,
}

/// Fields supplied when creating a strategy.
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyDraft {
    pub name: String,
    pub strategy_type: String,
    /// Raw option map; `null` or absent means defaults.
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub schedule: Option<Schedule>,
}

fn default_active() -> bool {
    true
}

/// Fields that may change on an existing strategy. Absent means unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StrategyPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub strategy_type: Option<String>,
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct StrategyStore {
    path: Option<PathBuf>,
    policy: UnknownStrategyPolicy,
    next_id: u64,
    strategies: BTreeMap<u64, StrategyDefinition>,
}

impl StrategyStore {
    /// Store that is never written to disk.
    pub fn in_memory(policy: UnknownStrategyPolicy) -> Self {
        Self {
            path: None,
            policy,
            next_id: 1,
            strategies: BTreeMap::new(),
        }
    }

    /// Open a file-backed store, loading existing definitions if present.
    pub fn open(path: impl Into<PathBuf>, policy: UnknownStrategyPolicy) -> Result<Self> {
        let path = path.into();
        let stored = load_strategies(&path)?.unwrap_or_default();

        let strategies: BTreeMap<u64, StrategyDefinition> =
            stored.strategies.into_iter().map(|s| (s.id, s)).collect();
        let next_id = strategies
            .keys()
            .next_back()
            .map(|max| max + 1)
            .unwrap_or(1)
            .max(stored.next_id);

        Ok(Self {
            path: Some(path),
            policy,
            next_id,
            strategies,
        })
    }

    pub fn policy(&self) -> UnknownStrategyPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// All definitions ordered by id.
    pub fn list(&self) -> Vec<StrategyDefinition> {
        self.strategies.values().cloned().collect()
    }

    pub fn get(&self, id: u64) -> Result<&StrategyDefinition, AutomatorError> {
        self.strategies
            .get(&id)
            .ok_or(AutomatorError::StrategyNotFound(id))
    }

    /// Definitions with the given ids, in the order requested.
    pub fn get_many(&self, ids: &[u64]) -> Result<Vec<StrategyDefinition>, AutomatorError> {
        ids.iter().map(|id| self.get(*id).cloned()).collect()
    }

    /// Active definitions enabled for `betting_house`.
    pub fn for_house(&self, betting_house: &str) -> Vec<StrategyDefinition> {
        self.strategies
            .values()
            .filter(|s| s.active && s.config.accepts_house(betting_house))
            .cloned()
            .collect()
    }

    pub fn insert(&mut self, draft: StrategyDraft) -> Result<StrategyDefinition> {
        let now = Utc::now();
        let definition = StrategyDefinition {
            id: self.next_id,
            name: draft.name,
            strategy_type: draft.strategy_type,
            active: draft.active,
            config: StrategyConfig::from_value(draft.config).map_err(AutomatorError::from)?,
            schedule: draft.schedule.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };
        definition
            .validate(self.policy)
            .map_err(AutomatorError::from)?;

        let mut strategies = self.strategies.clone();
        strategies.insert(definition.id, definition.clone());
        self.commit(self.next_id + 1, strategies)?;

        info!(
            strategy_id = definition.id,
            strategy_type = %definition.strategy_type,
            "Strategy created"
        );
        Ok(definition)
    }

    pub fn update(&mut self, id: u64, patch: StrategyPatch) -> Result<StrategyDefinition> {
        let mut updated = self.get(id)?.clone();

        if let Some(name) = patch.name {
            updated.name = name;
        }
        if let Some(strategy_type) = patch.strategy_type {
            updated.strategy_type = strategy_type;
        }
        if let Some(config) = patch.config {
            updated.config = StrategyConfig::from_value(config).map_err(AutomatorError::from)?;
        }
        if let Some(active) = patch.active {
            updated.active = active;
        }
        if let Some(schedule) = patch.schedule {
            updated.schedule = schedule;
        }
        updated.validate(self.policy).map_err(AutomatorError::from)?;
        updated.updated_at = Utc::now();

        let mut strategies = self.strategies.clone();
        strategies.insert(id, updated.clone());
        self.commit(self.next_id, strategies)?;
        debug!(strategy_id = id, "Strategy updated");
        Ok(updated)
    }

    pub fn remove(&mut self, id: u64) -> Result<StrategyDefinition> {
        let mut strategies = self.strategies.clone();
        let removed = strategies
            .remove(&id)
            .ok_or(AutomatorError::StrategyNotFound(id))?;
        self.commit(self.next_id, strategies)?;
        info!(strategy_id = id, "Strategy deleted");
        Ok(removed)
    }

    /// Flip the active flag.
    pub fn toggle(&mut self, id: u64) -> Result<StrategyDefinition> {
        let mut toggled = self.get(id)?.clone();
        toggled.active = !toggled.active;
        toggled.updated_at = Utc::now();

        let mut strategies = self.strategies.clone();
        strategies.insert(id, toggled.clone());
        self.commit(self.next_id, strategies)?;
        info!(strategy_id = id, active = toggled.active, "Strategy toggled");
        Ok(toggled)
    }

    /// Apply a schedule change to the given strategies, or all when `ids`
    /// is empty. Returns the number of strategies changed.
    pub fn apply_schedule(&mut self, ids: &[u64], change: impl Fn(&mut Schedule)) -> Result<usize> {
        for id in ids {
            self.get(*id)?;
        }

        // All or nothing: compute and validate every schedule first
        let mut staged = Vec::new();
        for strategy in self.strategies.values() {
            if !ids.is_empty() && !ids.contains(&strategy.id) {
                continue;
            }
            let mut schedule = strategy.schedule.clone();
            change(&mut schedule);
            schedule.validate().map_err(AutomatorError::from)?;
            staged.push((strategy.id, schedule));
        }

        let now = Utc::now();
        let changed = staged.len();
        let mut strategies = self.strategies.clone();
        for (id, schedule) in staged {
            if let Some(strategy) = strategies.get_mut(&id) {
                strategy.schedule = schedule;
                strategy.updated_at = now;
            }
        }

        self.commit(self.next_id, strategies)?;
        info!(count = changed, "Schedules updated");
        Ok(changed)
    }

    /// Write the new state, then make it live. On a failed write the store
    /// is left exactly as it was.
    fn commit(
        &mut self,
        next_id: u64,
        strategies: BTreeMap<u64, StrategyDefinition>,
    ) -> Result<()> {
        if let Some(path) = &self.path {
            let stored = StoredStrategies {
                next_id,
                strategies: strategies.values().cloned().collect(),
            };
            save_strategies(&stored, path)?;
        }
        self.next_id = next_id;
        self.strategies = strategies;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// File helpers
// ---------------------------------------------------------------------------

/// Save strategies to a JSON file, creating the parent directory if needed.
pub fn save_strategies(stored: &StoredStrategies, path: &Path) -> Result<()> {
    let json =
        serde_json::to_string_pretty(stored).context("Failed to serialise strategies")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, &json)
        .with_context(|| format!("Failed to write strategies to {}", path.display()))?;

    debug!(path = %path.display(), count = stored.strategies.len(), "Strategies saved");
    Ok(())
}

/// Load strategies from a JSON file.
/// Returns None if the file doesn't exist (fresh start).
pub fn load_strategies(path: &Path) -> Result<Option<StoredStrategies>> {
    if !path.exists() {
        info!(path = %path.display(), "No saved strategies found, starting fresh");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read strategies from {}", path.display()))?;

    let stored: StoredStrategies = serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse strategies from {}", path.display()))?;

    info!(
        path = %path.display(),
        count = stored.strategies.len(),
        "Strategies loaded from disk"
    );

    Ok(Some(stored))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
