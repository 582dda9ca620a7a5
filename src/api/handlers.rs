//! Control API handlers
//!
//! Handlers hold nothing but a [`ControlHandle`]; every command either
//! returns an envelope or an envelope error, never tearing down the server.

use axum::extract::{FromRequest, FromRequestParts, State};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use super::envelope::{ApiRejection, ApiResponse};
use crate::agent::ControlHandle;
use crate::config::defaults::DEFAULT_ISSUES_LIMIT;

/// `axum::Json` whose rejections use the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiRejection))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` whose rejections use the error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiRejection))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, Deserialize)]
pub struct IssuesQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AutoFixBody {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
struct CycleSummary<T: Serialize> {
    message: String,
    #[serde(flatten)]
    outcome: T,
}

/// GET /api/v1/status
pub async fn get_status(State(control): State<ControlHandle>) -> Response {
    ApiResponse::ok(control.status())
}

/// POST /api/v1/cycle
pub async fn run_cycle(State(control): State<ControlHandle>) -> Response {
    match control.trigger_cycle().await {
        Ok(outcome) => ApiResponse::ok(CycleSummary {
            message: outcome.message(),
            outcome,
        }),
        Err(e) => {
            tracing::warn!(error = %e, "Manual cycle rejected");
            e.into_response()
        }
    }
}

/// GET /api/v1/issues?limit=N
pub async fn get_issues(
    State(control): State<ControlHandle>,
    ApiQuery(q): ApiQuery<IssuesQuery>,
) -> Response {
    let limit = q.limit.unwrap_or(DEFAULT_ISSUES_LIMIT);
    match control.recent_issues(limit) {
        Ok(entries) => ApiResponse::ok(entries),
        Err(e) => e.into_response(),
    }
}

/// GET /api/v1/autofix
pub async fn get_autofix(State(control): State<ControlHandle>) -> Response {
    ApiResponse::ok(AutoFixBody {
        enabled: control.auto_fix(),
    })
}

/// POST /api/v1/autofix
pub async fn set_autofix(
    State(control): State<ControlHandle>,
    ApiJson(body): ApiJson<AutoFixBody>,
) -> Response {
    control.set_auto_fix(body.enabled);
    ApiResponse::ok(AutoFixBody {
        enabled: control.auto_fix(),
    })
}

/// GET /health
pub async fn liveness() -> Response {
    ApiResponse::ok(serde_json::json!({ "status": "ok" }))
}
