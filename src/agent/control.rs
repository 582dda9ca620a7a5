//! Narrow command interface for the control surface
//!
//! Reads go straight to the shared [`AgentState`]; manual cycles are sent
//! to the scheduler task and answered over a oneshot channel.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

use super::cycle::CycleOutcome;
use super::scheduler::ControlCommand;
use super::state::{AgentState, Counters, HistoryEntry};
use crate::config::defaults::{MAX_ISSUES_LIMIT, MIN_ISSUES_LIMIT};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("limit must be between {min} and {max}, got {0}", min = MIN_ISSUES_LIMIT, max = MAX_ISSUES_LIMIT)]
    InvalidLimit(usize),
    #[error("scheduler is not running")]
    SchedulerUnavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    /// Every record of the latest cycle was healthy
    pub healthy: bool,
    pub auto_fix: bool,
    pub stats: Counters,
    pub history_len: usize,
    pub summary: String,
}

#[derive(Clone)]
pub struct ControlHandle {
    state: Arc<AgentState>,
    commands: mpsc::Sender<ControlCommand>,
}

impl ControlHandle {
    pub fn new(state: Arc<AgentState>, commands: mpsc::Sender<ControlCommand>) -> Self {
        Self { state, commands }
    }

    pub fn status(&self) -> StatusSnapshot {
        let stats = self.state.counters();
        let healthy = stats.systems_total > 0 && stats.systems_healthy == stats.systems_total;

        let mut summary = format!(
            "Systems: {}/{} healthy\nToday's issues: {}\nAuto-fixes: {}\nMonitoring cycles: {}\n",
            stats.systems_healthy,
            stats.systems_total,
            stats.issues_found,
            stats.actions_taken,
            stats.total_checks
        );
        if healthy {
            summary.push_str("All systems operational");
        } else {
            summary.push_str(&format!(
                "{} system(s) need attention",
                stats.systems_total - stats.systems_healthy
            ));
        }

        StatusSnapshot {
            healthy,
            auto_fix: self.state.auto_fix(),
            stats,
            history_len: self.state.history_len(),
            summary,
        }
    }

    /// Run a cycle out of band and return that cycle's own outcome.
    ///
    /// Queued behind any cycle already running.
    pub async fn trigger_cycle(&self) -> Result<CycleOutcome, ControlError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(ControlCommand::RunCycle { reply })
            .await
            .map_err(|_| ControlError::SchedulerUnavailable)?;
        rx.await.map_err(|_| ControlError::SchedulerUnavailable)
    }

    /// Last `limit` history entries, oldest first.
    pub fn recent_issues(&self, limit: usize) -> Result<Vec<HistoryEntry>, ControlError> {
        if !(MIN_ISSUES_LIMIT..=MAX_ISSUES_LIMIT).contains(&limit) {
            return Err(ControlError::InvalidLimit(limit));
        }
        Ok(self.state.recent_history(limit))
    }

    pub fn auto_fix(&self) -> bool {
        self.state.auto_fix()
    }

    pub fn set_auto_fix(&self, enabled: bool) {
        self.state.set_auto_fix(enabled);
        tracing::info!(enabled, "Auto-fix toggled");
    }
}
