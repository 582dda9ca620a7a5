//! One monitoring cycle: collect → evaluate → decide → execute → record

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::state::{ActionOutcome, ActionRecord, AgentState, HistoryEntry, SkipReason};
use crate::advisory::DecisionProvider;
use crate::config::defaults;
use crate::monitors::Monitor;
use crate::notifications::NotificationSink;
use crate::remediation::{ExecutionResult, RemediationExecutor};
use crate::types::{Action, ActionKind, HealthRecord};

/// Result of one cycle, returned to whoever triggered it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleOutcome {
    pub cycle_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub systems_total: u64,
    pub systems_healthy: u64,
    pub issues: Vec<HealthRecord>,
    pub actions: Vec<ActionRecord>,
    /// Monitors whose checks failed this cycle
    pub monitor_failures: Vec<String>,
}

impl CycleOutcome {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn message(&self) -> String {
        if self.issues.is_empty() {
            "Check complete. No issues found.".to_string()
        } else {
            format!(
                "Check complete. Found {} issue(s), took {} action(s).",
                self.issues.len(),
                self.actions.len()
            )
        }
    }
}

/// Owns every collaborator a cycle touches.
///
/// Lives inside the scheduler task; cycles run strictly one at a time.
pub struct CycleEngine {
    monitors: Vec<Box<dyn Monitor>>,
    provider: Box<dyn DecisionProvider>,
    executor: RemediationExecutor,
    notifier: Arc<dyn NotificationSink>,
    state: Arc<AgentState>,
    allowed: Vec<ActionKind>,
    monitor_timeout: Duration,
}

impl CycleEngine {
    pub fn new(
        monitors: Vec<Box<dyn Monitor>>,
        provider: Box<dyn DecisionProvider>,
        executor: RemediationExecutor,
        notifier: Arc<dyn NotificationSink>,
        state: Arc<AgentState>,
        allowed: Vec<ActionKind>,
    ) -> Self {
        Self {
            monitors,
            provider,
            executor,
            notifier,
            state,
            allowed,
            monitor_timeout: Duration::from_secs(defaults::MONITOR_TIMEOUT_SECS),
        }
    }

    /// Bound each monitor's `run_checks`; a monitor past the limit is
    /// dropped from the cycle like one that failed.
    #[must_use]
    pub fn with_monitor_timeout(mut self, timeout: Duration) -> Self {
        self.monitor_timeout = timeout;
        self
    }

    pub fn state(&self) -> &Arc<AgentState> {
        &self.state
    }

    pub fn notifier(&self) -> &Arc<dyn NotificationSink> {
        &self.notifier
    }

    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.run_cycle_at(Instant::now()).await
    }

    /// Run a cycle; `now` feeds the remediation cooldown ledger.
    pub async fn run_cycle_at(&mut self, now: Instant) -> CycleOutcome {
        let cycle_id = Uuid::new_v4();
        let timestamp = Utc::now();
        info!(%cycle_id, monitors = self.monitors.len(), "Starting monitoring cycle");

        // Collecting
        let (results, monitor_failures) = self.collect().await;

        // Evaluating
        let systems_total = results.len() as u64;
        let issues: Vec<HealthRecord> = results.iter().filter(|r| !r.healthy).cloned().collect();
        let systems_healthy = systems_total - issues.len() as u64;
        self.state.observe_cycle(systems_total, systems_healthy);

        let mut outcome = CycleOutcome {
            cycle_id,
            timestamp,
            systems_total,
            systems_healthy,
            issues: Vec::new(),
            actions: Vec::new(),
            monitor_failures,
        };

        if issues.is_empty() {
            self.notifier.notify_system_healthy().await;
            return outcome;
        }
        self.notifier.notify_issue_detected(&issues).await;

        // Deciding
        let actions = self.decide(&results).await;
        if actions.is_empty() {
            warn!(%cycle_id, "No actions recommended");
        }

        // Executing
        let mut records = Vec::with_capacity(actions.len());
        for action in actions {
            records.push(self.handle_action(action, now).await);
        }
        let succeeded = records.iter().filter(|r| r.succeeded()).count() as u64;
        self.state.add_actions_taken(succeeded);

        // Recording
        outcome.issues = issues;
        outcome.actions = records;
        self.state.push_history(HistoryEntry {
            cycle_id,
            timestamp,
            issues: outcome.issues.clone(),
            actions: outcome.actions.clone(),
        });

        info!(
            %cycle_id,
            issues = outcome.issues.len(),
            actions = outcome.actions.len(),
            succeeded,
            "Monitoring cycle complete"
        );
        outcome
    }

    /// Emit the daily summary and reset counters when a rollup is due.
    pub async fn maybe_rollup(&self, now: Instant) -> bool {
        match self.state.take_rollup_if_due(now) {
            Some(counters) => {
                self.notifier.notify_daily_summary(&counters).await;
                true
            }
            None => false,
        }
    }

    async fn collect(&self) -> (Vec<HealthRecord>, Vec<String>) {
        let limit = self.monitor_timeout;
        let runs = self.monitors.iter().map(|m| async move {
            let run = AssertUnwindSafe(m.run_checks()).catch_unwind();
            (m.name(), tokio::time::timeout(limit, run).await)
        });

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for (name, result) in futures::future::join_all(runs).await {
            match result {
                Ok(Ok(Ok(records))) => results.extend(records),
                Ok(Ok(Err(e))) => {
                    error!(monitor = name, error = %e, "Monitor failed");
                    failures.push(name.to_string());
                }
                Ok(Err(_)) => {
                    error!(monitor = name, "Monitor panicked");
                    failures.push(name.to_string());
                }
                Err(_) => {
                    error!(monitor = name, timeout = ?limit, "Monitor timed out");
                    failures.push(name.to_string());
                }
            }
        }
        (results, failures)
    }

    async fn decide(&self, results: &[HealthRecord]) -> Vec<Action> {
        let analysis = AssertUnwindSafe(self.provider.analyze(results, &self.allowed))
            .catch_unwind()
            .await;
        match analysis {
            Ok(Ok(actions)) => actions,
            Ok(Err(e)) => {
                error!(provider = self.provider.name(), error = %e, "Decision failed");
                Vec::new()
            }
            Err(_) => {
                error!(provider = self.provider.name(), "Decision provider panicked");
                Vec::new()
            }
        }
    }

    async fn handle_action(&mut self, action: Action, now: Instant) -> ActionRecord {
        info!(
            action = %action.action,
            severity = %action.severity,
            reasoning = %action.reasoning,
            "Recommendation"
        );

        let skip = if action.action == ActionKind::AlertOnly {
            Some(SkipReason::AlertOnly)
        } else if !self.state.auto_fix() {
            Some(SkipReason::AutoFixDisabled)
        } else if !self.allowed.contains(&action.action) {
            Some(SkipReason::NotAllowed)
        } else {
            None
        };

        if let Some(reason) = skip {
            self.notifier.notify_critical_issue(&action).await;
            return ActionRecord {
                action,
                outcome: ActionOutcome::NotExecuted { reason },
            };
        }

        let result = AssertUnwindSafe(self.executor.execute_at(&action, now))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!(action = %action.action, "Remediation panicked");
                ExecutionResult::failed("remediation panicked")
            });
        self.notifier
            .notify_action_taken(&action, result.success, &result.message)
            .await;
        ActionRecord {
            action,
            outcome: ActionOutcome::Executed {
                success: result.success,
                message: result.message,
            },
        }
    }
}
