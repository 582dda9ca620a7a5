//! netmon-agent: health monitoring with advisory-driven remediation
//!
//! ## Architecture
//!
//! - **Monitors**: produce [`types::HealthRecord`]s, each failing independently
//! - **Advisory**: turns unhealthy records into [`types::Action`]s, falling
//!   back to a deterministic rule engine when the backend is unreachable
//! - **Remediation**: applies actions through a cooldown ledger
//! - **Agent**: cycle engine, scheduler task, shared state and control handle
//! - **API**: HTTP control surface over the control handle

pub mod advisory;
pub mod agent;
pub mod api;
pub mod config;
pub mod monitors;
pub mod notifications;
pub mod remediation;
pub mod types;

pub use config::AgentConfig;
pub use types::{Action, ActionKind, HealthRecord, Severity};
