//! Agent core: shared state, the cycle engine, its scheduler task and the
//! control handle used by the HTTP surface.
//!
//! ## Concurrency
//!
//! ```text
//! HTTP handlers ──ControlHandle──┬── reads ──────────► Arc<AgentState>
//!                                └── mpsc RunCycle ──► Scheduler task ──► CycleEngine
//!                                                         (interval tick)      │
//!                                                                               └► writes AgentState
//! ```

mod control;
mod cycle;
mod scheduler;
mod state;

pub use control::{ControlError, ControlHandle, StatusSnapshot};
pub use cycle::{CycleEngine, CycleOutcome};
pub use scheduler::{command_channel, ControlCommand, Scheduler};
pub use state::{
    ActionOutcome, ActionRecord, AgentState, Counters, HistoryEntry, HistoryRing, SkipReason,
};
