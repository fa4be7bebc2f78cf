//! Security headers middleware for HTTP responses.
//!
//! Outermost stage of the pipeline, so every response carries the headers,
//! including CORS, CSRF and payload rejections produced further in.

use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::pipeline::Stage;

fn insert_configured(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(val) => {
            headers.insert(HeaderName::from_static(name), val);
        }
        Err(e) => tracing::warn!(
            stage = Stage::SecurityHeaders.as_str(),
            header = name,
            error = %e,
            "configured header value is invalid; skipped"
        ),
    }
}

/// Adds the security header set to all responses.
///
/// - `X-Content-Type-Options: nosniff`
/// - `X-Frame-Options`, `Referrer-Policy`, `Content-Security-Policy` and
///   `Strict-Transport-Security` from the `[security]` config section
/// - `Permissions-Policy` and `Cross-Origin-Opener-Policy` with fixed values
///
/// JSON responses are additionally marked `no-store`, which keeps issued CSRF
/// tokens out of shared caches.
pub async fn security_headers_middleware(
    State(cfg): State<Arc<AppConfig>>,
    req: Request,
    next: Next,
) -> Response {
    let mut res = next.run(req).await;
    let sec = &cfg.security;
    let headers = res.headers_mut();

    headers.insert(HeaderName::from_static("x-content-type-options"), HeaderValue::from_static("nosniff"));
    insert_configured(headers, "x-frame-options", &sec.frame_options);
    insert_configured(headers, "referrer-policy", &sec.referrer_policy);
    insert_configured(headers, "content-security-policy", &sec.csp);
    insert_configured(headers, "strict-transport-security", &sec.hsts_value());

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );

    let is_json = headers
        .get(CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .map(|s| s.starts_with("application/json"))
        .unwrap_or(false);
    if is_json {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    }

    res
}
