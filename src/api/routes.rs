//! Control API route table
//!
//! - /api/v1/status  - counters, health flag, auto-fix flag, summary
//! - /api/v1/cycle   - run a monitoring cycle now
//! - /api/v1/issues  - recent issue history
//! - /api/v1/autofix - read or flip the auto-fix flag

use axum::routing::{get, post};
use axum::Router;

use super::handlers;
use crate::agent::ControlHandle;

pub fn api_routes(control: ControlHandle) -> Router {
    Router::new()
        .route("/status", get(handlers::get_status))
        .route("/cycle", post(handlers::run_cycle))
        .route("/issues", get(handlers::get_issues))
        .route(
            "/autofix",
            get(handlers::get_autofix).post(handlers::set_autofix),
        )
        .with_state(control)
}

/// Liveness endpoint at root level
pub fn health_routes() -> Router {
    Router::new().route("/health", get(handlers::liveness))
}
