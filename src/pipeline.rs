//! Assembly of the request filter pipeline.
//!
//! Axum runs the most recently added layer first, so [`build_router`] adds
//! the stages in reverse. Inbound, a request passes:
//!
//! security headers → trace → origin guard → CORS → authentication → CSRF →
//! XSS sanitization → body limit → handler
//!
//! The security header stage wraps everything, so rejections produced by
//! any inner stage leave with the full header set.

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::middleware;
use crate::routes;
use crate::state::AppState;

/// Pipeline stages, used as the `stage` field in log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Cors,
    Authentication,
    Csrf,
    Sanitization,
    SecurityHeaders,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Cors => "cors",
            Stage::Authentication => "authentication",
            Stage::Csrf => "csrf",
            Stage::Sanitization => "sanitization",
            Stage::SecurityHeaders => "security_headers",
        }
    }
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/csrf/token", get(routes::csrf::get_token))
        .route("/csrf/refresh", post(routes::csrf::refresh_token))
        .route("/csrf/status", get(routes::csrf::status))
        .route("/users", post(routes::users::register))
        .route("/users/me", get(routes::users::me))
}

pub fn build_router(state: AppState) -> Router {
    let cfg = state.config.clone();

    Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route("/readyz", get(routes::health::readyz))
        .route("/metrics", get(routes::health::metrics))
        .route("/metrics/prometheus", get(routes::health::metrics_prometheus))
        .route("/version", get(routes::health::version))
        .nest("/api", api_routes())
        .with_state(state.clone())
        .layer(DefaultBodyLimit::max(cfg.server.max_body_bytes))
        .layer(from_fn_with_state(state.clone(), middleware::xss::xss_sanitize_middleware))
        .layer(from_fn_with_state(state.clone(), middleware::csrf::csrf_protection_middleware))
        .layer(from_fn_with_state(state.clone(), middleware::auth::jwt_auth_middleware))
        .layer(middleware::cors::build_cors_layer(&cfg.cors))
        .layer(from_fn_with_state(state, middleware::cors::origin_guard))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(cfg, middleware::security_headers::security_headers_middleware))
}
