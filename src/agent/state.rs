//! Process-wide agent state
//!
//! Written only by the scheduler task (counters, history, rollup timer) and
//! by the control surface (auto-fix flag). Readers always get a consistent
//! copy: counters are snapshotted and reset under one lock, the flag is an
//! atomic, and history reads clone out of the ring.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::config::defaults;
use crate::types::{Action, HealthRecord};

/// The five daily counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counters {
    /// Completed cycles
    pub total_checks: u64,
    /// Unhealthy records seen
    pub issues_found: u64,
    /// Successful remediations
    pub actions_taken: u64,
    /// Healthy records in the latest cycle
    pub systems_healthy: u64,
    /// All records in the latest cycle
    pub systems_total: u64,
}

/// Why an action was routed to a human instead of the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlertOnly,
    AutoFixDisabled,
    NotAllowed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionOutcome {
    Executed { success: bool, message: String },
    NotExecuted { reason: SkipReason },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRecord {
    #[serde(flatten)]
    pub action: Action,
    pub outcome: ActionOutcome,
}

impl ActionRecord {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, ActionOutcome::Executed { success: true, .. })
    }
}

/// One cycle that found issues.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub cycle_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub issues: Vec<HealthRecord>,
    pub actions: Vec<ActionRecord>,
}

// ============================================================================
// Ring buffer
// ============================================================================

/// Fixed-capacity FIFO. Pushing into a full ring overwrites the oldest slot.
#[derive(Debug)]
pub struct HistoryRing<T> {
    slots: Vec<Option<T>>,
    /// Next slot to write
    head: usize,
    len: usize,
}

impl<T: Clone> HistoryRing<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn push(&mut self, item: T) {
        let cap = self.capacity();
        self.slots[self.head] = Some(item);
        self.head = (self.head + 1) % cap;
        self.len = (self.len + 1).min(cap);
    }

    /// Up to `n` most recent items, oldest first.
    pub fn last(&self, n: usize) -> Vec<T> {
        let cap = self.capacity();
        let n = n.min(self.len);
        let start = (self.head + cap - n) % cap;
        (0..n)
            .filter_map(|i| self.slots[(start + i) % cap].clone())
            .collect()
    }
}

// ============================================================================
// AgentState
// ============================================================================

pub struct AgentState {
    counters: RwLock<Counters>,
    auto_fix: AtomicBool,
    history: RwLock<HistoryRing<HistoryEntry>>,
    last_summary: RwLock<Instant>,
    rollup_period: Duration,
}

impl AgentState {
    pub fn new(auto_fix: bool, now: Instant) -> Self {
        Self {
            counters: RwLock::new(Counters::default()),
            auto_fix: AtomicBool::new(auto_fix),
            history: RwLock::new(HistoryRing::with_capacity(defaults::HISTORY_CAPACITY)),
            last_summary: RwLock::new(now),
            rollup_period: Duration::from_secs(defaults::DAILY_ROLLUP_SECS),
        }
    }

    pub fn counters(&self) -> Counters {
        *self.counters.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn auto_fix(&self) -> bool {
        self.auto_fix.load(Ordering::SeqCst)
    }

    pub fn set_auto_fix(&self, enabled: bool) {
        self.auto_fix.store(enabled, Ordering::SeqCst);
    }

    /// Account for one evaluated cycle.
    pub(crate) fn observe_cycle(&self, systems_total: u64, systems_healthy: u64) {
        let mut c = self.counters.write().unwrap_or_else(|e| e.into_inner());
        c.total_checks += 1;
        c.systems_total = systems_total;
        c.systems_healthy = systems_healthy.min(systems_total);
        c.issues_found += systems_total - c.systems_healthy;
    }

    pub(crate) fn add_actions_taken(&self, n: u64) {
        if n > 0 {
            self.counters.write().unwrap_or_else(|e| e.into_inner()).actions_taken += n;
        }
    }

    pub(crate) fn push_history(&self, entry: HistoryEntry) {
        self.history.write().unwrap_or_else(|e| e.into_inner()).push(entry);
    }

    /// Up to `limit` most recent history entries, oldest first.
    pub fn recent_history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.history.read().unwrap_or_else(|e| e.into_inner()).last(limit)
    }

    pub fn history_len(&self) -> usize {
        self.history.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// If a full rollup period has elapsed, snapshot and zero the counters
    /// and restart the period at `now`. Returns the snapshot.
    pub(crate) fn take_rollup_if_due(&self, now: Instant) -> Option<Counters> {
        let mut last = self.last_summary.write().unwrap_or_else(|e| e.into_inner());
        if now.saturating_duration_since(*last) < self.rollup_period {
            return None;
        }
        let mut c = self.counters.write().unwrap_or_else(|e| e.into_inner());
        let snapshot = std::mem::take(&mut *c);
        *last = now;
        Some(snapshot)
    }
}
