//! Automation sessions.
//!
//! A session follows one live table: it owns the spin history, the
//! strategies enabled for that table's betting house and the wagers still
//! waiting on the next result. Each session runs as its own tokio task and
//! is driven through a [`SessionHandle`]; spin results are pushed in by the
//! caller.
//!
//! On every spin the session:
//! 1. settles wagers placed after the previous spin,
//! 2. records the spin in the history,
//! 3. evaluates every strategy active now for the session's house,
//! 4. records each generated wager as pending and sends it to the executor,
//!    marking it placed or failed.

use chrono::{DateTime, Local, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::executor::Executor;
use crate::strategy::settlement::settle;
use crate::strategy::{
    EvaluationRecord, StrategyDefinition, StrategyEvaluator, StrategyKind, UnknownStrategyPolicy,
};
use crate::types::{is_valid_number, AutomatorError, SpinHistory, Wager, WagerStatus};

const COMMAND_BUFFER: usize = 32;

/// Settled wagers kept in a snapshot.
pub const RECENT_SETTLED_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// Session data
// ---------------------------------------------------------------------------

/// Everything needed to start a session.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub betting_house: String,
    pub market_id: String,
    pub strategies: Vec<StrategyDefinition>,
    pub history_window: usize,
    /// Spins already seen at the table, most recent first.
    pub initial_history: Vec<u8>,
}

/// A wager generated by a strategy, awaiting the next result.
#[derive(Debug, Clone, Serialize)]
pub struct OpenWager {
    pub strategy_id: u64,
    pub strategy_type: StrategyKind,
    pub wager: Wager,
    pub status: WagerStatus,
    pub order_id: Option<String>,
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettledWager {
    pub strategy_id: u64,
    pub strategy_type: StrategyKind,
    pub wager: Wager,
    pub order_id: Option<String>,
    pub status: WagerStatus,
    pub profit: Decimal,
    pub winning_number: u8,
    pub settled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub spins: u64,
    pub triggers: u64,
    pub wagers_placed: u64,
    pub wagers_failed: u64,
    pub wagers_won: u64,
    pub wagers_lost: u64,
    pub total_staked: Decimal,
    pub total_profit: Decimal,
}

/// What happened when one spin was recorded.
#[derive(Debug, Clone, Serialize)]
pub struct SpinOutcome {
    pub winning_number: u8,
    pub settled: Vec<SettledWager>,
    pub evaluations: Vec<EvaluationRecord>,
    pub placed: Vec<OpenWager>,
    pub failed: Vec<OpenWager>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub betting_house: String,
    pub market_id: String,
    pub started_at: DateTime<Utc>,
    pub running: bool,
    pub strategy_ids: Vec<u64>,
    pub history: Vec<u8>,
    pub open_wagers: Vec<OpenWager>,
    pub recent_settled: Vec<SettledWager>,
    pub stats: SessionStats,
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

enum SessionCommand {
    RecordSpin {
        number: u8,
        reply: oneshot::Sender<Result<SpinOutcome, AutomatorError>>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Stop {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

struct Session {
    id: Uuid,
    betting_house: String,
    market_id: String,
    started_at: DateTime<Utc>,
    strategies: Vec<StrategyDefinition>,
    evaluator: StrategyEvaluator,
    executor: Arc<Executor>,
    history: SpinHistory,
    open: Vec<OpenWager>,
    recent_settled: VecDeque<SettledWager>,
    stats: SessionStats,
}

impl Session {
    async fn record_spin(&mut self, number: u8) -> Result<SpinOutcome, AutomatorError> {
        if !is_valid_number(number) {
            return Err(AutomatorError::InvalidSpin(number));
        }

        let settled = self.settle_open(number);
        self.history.record(number)?;
        self.stats.spins += 1;

        let now = Local::now().naive_local();
        let (fired, evaluations) = self.evaluator.evaluate_all(
            &self.strategies,
            self.history.as_slice(),
            &self.betting_house,
            now,
        )?;

        let mut placed = Vec::new();
        let mut failed = Vec::new();

        for batch in fired {
            self.stats.triggers += 1;
            for wager in batch.wagers {
                let mut open = OpenWager {
                    strategy_id: batch.strategy_id,
                    strategy_type: batch.kind,
                    wager,
                    status: WagerStatus::Pending,
                    order_id: None,
                    failure: None,
                    created_at: Utc::now(),
                };

                match self.executor.execute_one(&self.market_id, &open.wager).await {
                    Ok(receipt) => {
                        open.status = WagerStatus::Placed;
                        open.order_id = Some(receipt.order_id);
                        self.stats.wagers_placed += 1;
                        self.stats.total_staked += open.wager.amount;
                        placed.push(open.clone());
                        self.open.push(open);
                    }
                    Err(e) => {
                        warn!(
                            session_id = %self.id,
                            strategy_id = batch.strategy_id,
                            number = open.wager.number,
                            error = %e,
                            "Wager not placed"
                        );
                        open.status = WagerStatus::Failed;
                        open.failure = Some(format!("{e:#}"));
                        self.stats.wagers_failed += 1;
                        failed.push(open);
                    }
                }
            }
        }

        info!(
            session_id = %self.id,
            spin = number,
            settled = settled.len(),
            placed = placed.len(),
            failed = failed.len(),
            profit = %self.stats.total_profit,
            "Spin processed"
        );

        Ok(SpinOutcome {
            winning_number: number,
            settled,
            evaluations,
            placed,
            failed,
        })
    }

    /// Settle every open wager against `number`.
    fn settle_open(&mut self, number: u8) -> Vec<SettledWager> {
        let settled_at = Utc::now();
        let settled: Vec<SettledWager> = self
            .open
            .drain(..)
            .map(|open| {
                let result = settle(&[open.wager.number], open.wager.amount, number);
                SettledWager {
                    strategy_id: open.strategy_id,
                    strategy_type: open.strategy_type,
                    wager: open.wager,
                    order_id: open.order_id,
                    status: result.status,
                    profit: result.profit,
                    winning_number: number,
                    settled_at,
                }
            })
            .collect();

        for s in &settled {
            match s.status {
                WagerStatus::Won => self.stats.wagers_won += 1,
                _ => self.stats.wagers_lost += 1,
            }
            self.stats.total_profit += s.profit;
            self.recent_settled.push_back(s.clone());
        }
        while self.recent_settled.len() > RECENT_SETTLED_LIMIT {
            self.recent_settled.pop_front();
        }

        settled
    }

    fn snapshot(&self, running: bool) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            betting_house: self.betting_house.clone(),
            market_id: self.market_id.clone(),
            started_at: self.started_at,
            running,
            strategy_ids: self.strategies.iter().map(|s| s.id).collect(),
            history: self.history.as_slice().to_vec(),
            open_wagers: self.open.clone(),
            recent_settled: self.recent_settled.iter().cloned().collect(),
            stats: self.stats.clone(),
        }
    }

    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        info!(
            session_id = %self.id,
            betting_house = %self.betting_house,
            market_id = %self.market_id,
            strategies = self.strategies.len(),
            "Session started"
        );

        while let Some(command) = commands.recv().await {
            match command {
                SessionCommand::RecordSpin { number, reply } => {
                    let outcome = self.record_spin(number).await;
                    let _ = reply.send(outcome);
                }
                SessionCommand::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot(true));
                }
                SessionCommand::Stop { reply } => {
                    let _ = reply.send(self.snapshot(false));
                    break;
                }
            }
        }

        if !self.open.is_empty() {
            warn!(
                session_id = %self.id,
                open = self.open.len(),
                "Session stopped with unsettled wagers"
            );
        }
        info!(session_id = %self.id, profit = %self.stats.total_profit, "Session stopped");
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cheap, cloneable handle to a running session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: Uuid,
    commands: mpsc::Sender<SessionCommand>,
}

impl std::fmt::Debug for SessionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionCommand::RecordSpin { number, .. } => write!(f, "RecordSpin({number})"),
            SessionCommand::Snapshot { .. } => write!(f, "Snapshot"),
            SessionCommand::Stop { .. } => write!(f, "Stop"),
        }
    }
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, AutomatorError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| AutomatorError::SessionClosed(self.id))?;
        response
            .await
            .map_err(|_| AutomatorError::SessionClosed(self.id))
    }

    /// Push the latest winning number into the session.
    pub async fn record_spin(&self, number: u8) -> Result<SpinOutcome, AutomatorError> {
        self.request(|reply| SessionCommand::RecordSpin { number, reply })
            .await?
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, AutomatorError> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    /// Stop the session and return its final state.
    pub async fn stop(&self) -> Result<SessionSnapshot, AutomatorError> {
        self.request(|reply| SessionCommand::Stop { reply }).await
    }
}

/// Validate `params` and start a session task.
pub fn spawn_session(
    params: SessionParams,
    executor: Arc<Executor>,
    policy: UnknownStrategyPolicy,
) -> Result<SessionHandle, AutomatorError> {
    for def in &params.strategies {
        def.validate(policy)?;
    }
    let history = SpinHistory::from_recent(&params.initial_history, params.history_window)?;

    let id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);

    let session = Session {
        id,
        betting_house: params.betting_house,
        market_id: params.market_id,
        started_at: Utc::now(),
        strategies: params.strategies,
        evaluator: StrategyEvaluator::new(policy),
        executor,
        history,
        open: Vec::new(),
        recent_settled: VecDeque::new(),
        stats: SessionStats::default(),
    };
    tokio::spawn(session.run(rx));

    Ok(SessionHandle { id, commands: tx })
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// All sessions started by this process, keyed by id.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
    executor: Arc<Executor>,
    policy: UnknownStrategyPolicy,
}

impl SessionRegistry {
    pub fn new(executor: Arc<Executor>, policy: UnknownStrategyPolicy) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            executor,
            policy,
        }
    }

    pub async fn start(&self, params: SessionParams) -> Result<SessionHandle, AutomatorError> {
        let handle = spawn_session(params, Arc::clone(&self.executor), self.policy)?;
        self.sessions.write().await.insert(handle.id(), handle.clone());
        Ok(handle)
    }

    pub async fn get(&self, id: Uuid) -> Result<SessionHandle, AutomatorError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(AutomatorError::SessionNotFound(id))
    }

    /// Snapshots of every running session.
    pub async fn list(&self) -> Vec<SessionSnapshot> {
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();
        let snapshots = join_all(handles.iter().map(|h| h.snapshot())).await;
        let mut running: Vec<SessionSnapshot> =
            snapshots.into_iter().filter_map(Result::ok).collect();
        running.sort_by_key(|s| s.started_at);
        running
    }

    pub async fn stop(&self, id: Uuid) -> Result<SessionSnapshot, AutomatorError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(AutomatorError::SessionNotFound(id))?;
        handle.stop().await
    }

    /// Stop every session, returning their final snapshots.
    pub async fn stop_all(&self) -> Vec<SessionSnapshot> {
        let handles: Vec<SessionHandle> = self.sessions.write().await.drain().map(|(_, h)| h).collect();
        if handles.is_empty() {
            return Vec::new();
        }
        debug!(count = handles.len(), "Stopping all sessions");
        join_all(handles.iter().map(|h| h.stop()))
            .await
            .into_iter()
            .filter_map(Result::ok)
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
