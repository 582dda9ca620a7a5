//! Shared data structures for the monitoring and remediation loop
//!
//! - [`HealthRecord`]: one observation emitted by a monitor collaborator
//! - [`Action`]: a proposed remediation produced by the decision layer
//! - [`ActionKind`] / [`Severity`]: the closed vocabularies an action uses

mod action;
mod health;

pub use action::{Action, ActionKind, ActionParams, Severity};
pub use health::{ha_issues, metrics, mount_issues, HealthRecord};
