use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

// Health check endpoint - lightweight, no rate limiting
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

// Readiness probe: checks DB connectivity with timeout protection
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    // Add timeout to prevent hanging readiness checks
    let query = sqlx::query("SELECT 1").fetch_one(&state.db);
    match tokio::time::timeout(std::time::Duration::from_secs(5), query).await {
        Ok(Ok(_)) => (StatusCode::OK, "ready").into_response(),
        Ok(Err(e)) => (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", e)).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "not ready: timeout").into_response(),
    }
}

// Metrics endpoint: returns JSON snapshot
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.get_snapshot();
    Json(snapshot)
}

// Prometheus-compatible text exposition format
pub async fn metrics_prometheus(State(state): State<AppState>) -> impl IntoResponse {
    let m = state.metrics.get_snapshot();
    let counters = [
        ("csrf_tokens_issued", "CSRF tokens issued", m.tokens_issued),
        ("csrf_tokens_refreshed", "CSRF tokens refreshed", m.tokens_refreshed),
        ("csrf_checks_passed", "State-changing requests with a valid CSRF token", m.csrf_passed),
        ("csrf_token_missing", "Requests rejected for a missing CSRF token", m.csrf_missing),
        ("csrf_token_mismatch", "Requests rejected for an invalid or expired CSRF token", m.csrf_mismatch),
        ("cors_origin_rejected", "Requests rejected for a disallowed origin", m.origin_rejected),
        ("auth_token_invalid", "Bearer tokens that failed verification", m.auth_invalid),
        ("xss_fields_sanitized", "JSON string fields changed by the sanitizer", m.fields_sanitized),
        ("xss_fields_cleared", "JSON string fields cleared after a sanitizer failure", m.sanitizer_failures),
        ("csrf_records_purged", "Expired CSRF records removed by the sweep", m.records_purged),
    ];
    let mut body = String::new();
    for (name, help, value) in counters {
        body.push_str(&format!(
            "# HELP companyguard_{name} {help}\n# TYPE companyguard_{name} counter\ncompanyguard_{name} {value}\n"
        ));
    }
    body.push_str(&format!(
        "# HELP companyguard_uptime_seconds Uptime seconds\n# TYPE companyguard_uptime_seconds gauge\ncompanyguard_uptime_seconds {}\n",
        m.uptime_seconds
    ));
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

// Version/Build info endpoint (JSON)
pub async fn version() -> impl IntoResponse {
    let body = serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "package": {
            "description": env!("CARGO_PKG_DESCRIPTION"),
            "authors": env!("CARGO_PKG_AUTHORS"),
            "license": env!("CARGO_PKG_LICENSE"),
        },
        "build": {
            "profile": if cfg!(debug_assertions) { "debug" } else { "release" },
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
        }
    });
    (StatusCode::OK, Json(body))
}
