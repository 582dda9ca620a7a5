//! HTTP control surface
//!
//! Runs alongside the scheduler task; a slow cycle never blocks status
//! queries because handlers only touch the shared state and the command
//! channel.

pub mod envelope;
pub mod handlers;
mod routes;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent::ControlHandle;

/// Env var holding a comma-separated list of allowed CORS origins.
pub const CORS_ORIGINS_ENV: &str = "NETMON_CORS_ORIGINS";

/// Same-origin only unless [`CORS_ORIGINS_ENV`] lists origins.
fn build_cors_layer() -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    match std::env::var(CORS_ORIGINS_ENV) {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            base.allow_origin(allowed)
        }
        Err(_) => base,
    }
}

/// Complete router: versioned control API plus root liveness.
pub fn create_app(control: ControlHandle) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes(control))
        .merge(routes::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
}
