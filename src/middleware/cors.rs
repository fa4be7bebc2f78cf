//! CORS negotiation: the first stage of the pipeline.
//!
//! `tower-http`'s [`CorsLayer`] answers preflights and decorates allowed
//! responses, but it only ever omits headers for a foreign origin. The
//! [`origin_guard`] in front of it turns a disallowed cross-origin request
//! into a hard 403 before anything else runs.

use axum::{
    extract::{Request, State},
    http::{header, uri::Authority, HeaderMap, HeaderName, HeaderValue, Method, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::config::CorsConfig;
use crate::error::AppError;
use crate::pipeline::Stage;
use crate::state::AppState;

const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Credentialed CORS for the configured origins. Request headers are
/// mirrored since a wildcard is not allowed together with credentials.
pub fn build_cors_layer(cfg: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> =
        cfg.allowed_origins.iter().filter_map(|origin| HeaderValue::from_str(origin).ok()).collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-csrf-token"),
            HeaderName::from_static("x-xsrf-token"),
        ])
        .max_age(PREFLIGHT_MAX_AGE)
}

/// Rejects cross-origin requests whose `Origin` is not allow-listed.
/// Requests without `Origin` and same-origin requests pass.
pub async fn origin_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if let Some(origin) = cross_origin(req.headers()) {
        if !state.config.cors.allowed_origins.iter().any(|allowed| allowed == origin) {
            state.metrics.inc_origin_rejected();
            tracing::info!(stage = Stage::Cors.as_str(), origin = %origin, method = %req.method(), path = %req.uri().path(), "origin rejected");
            return AppError::OriginNotAllowed(origin.to_string()).into_response();
        }
    }
    next.run(req).await
}

/// The `Origin` header, unless it names the host the request was sent to.
/// An origin that does not parse is treated as foreign.
fn cross_origin(headers: &HeaderMap) -> Option<&str> {
    let origin = headers.get(header::ORIGIN)?.to_str().ok()?;
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());
    match host {
        Some(host) if same_authority(origin, host) => None,
        _ => Some(origin),
    }
}

/// Compares host and effective port; the port defaults from the origin's scheme.
fn same_authority(origin: &str, host: &str) -> bool {
    let Ok(origin) = origin.parse::<Uri>() else {
        return false;
    };
    let Ok(host) = host.parse::<Authority>() else {
        return false;
    };
    let (Some(origin_host), Some(default_port)) = (origin.host(), origin.scheme_str().and_then(default_port)) else {
        return false;
    };
    let origin_port = origin.port_u16().unwrap_or(default_port);
    let host_port = host.port_u16().unwrap_or(default_port);
    origin_host.eq_ignore_ascii_case(host.host()) && origin_port == host_port
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme.to_ascii_lowercase().as_str() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    }
}
