#![allow(dead_code)]

use std::collections::HashMap;

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use http_body_util::BodyExt;
use serde_json::Value;

use companyguard::auth::Claims;
use companyguard::config::AppConfig;
use companyguard::pipeline::build_router;
use companyguard::state::AppState;

pub const TEST_JWT_SECRET: &str = "integration-test-secret";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.jwt.secret = TEST_JWT_SECRET.to_string();
    config.users.bcrypt_cost = 4;
    config
}

pub async fn setup_test_app() -> (Router, AppState) {
    setup_test_app_with(test_config()).await
}

pub async fn setup_test_app_with(config: AppConfig) -> (Router, AppState) {
    let pool = companyguard::db::memory_pool().await.unwrap();
    let state = AppState::new(pool, config);
    (build_router(state.clone()), state)
}

pub async fn body_json(res: Response<Body>) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// name -> value of every `Set-Cookie` on the response.
pub fn set_cookies(res: &Response<Body>) -> HashMap<String, String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|raw| raw.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

pub fn raw_set_cookie<'a>(res: &'a Response<Body>, name: &str) -> Option<&'a str> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|raw| raw.starts_with(&format!("{}=", name)))
}

pub fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri)
}

pub fn post(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("POST").uri(uri)
}

pub fn json_body(value: &Value) -> Body {
    Body::from(serde_json::to_vec(value).unwrap())
}

pub fn issue_jwt(state: &AppState, sub: &str) -> String {
    let now = chrono::Utc::now().timestamp() as u64;
    state
        .jwt
        .issue(&Claims { sub: sub.to_string(), iat: now, exp: now + 600, role: Some("USER".into()) })
        .unwrap()
}

pub fn registration(username: &str) -> Value {
    serde_json::json!({
        "username": username,
        "password": "password123",
        "fullName": "Test User",
        "email": "test@example.com"
    })
}

/// Fetches a token as a guest. Returns (token, guest session cookie value).
pub async fn guest_token(app: &Router) -> (String, String) {
    use tower::ServiceExt;

    let res = app.clone().oneshot(get("/api/csrf/token").body(Body::empty()).unwrap()).await.unwrap();
    let cookies = set_cookies(&res);
    let session = cookies.get("CSRF-SESSION").cloned().unwrap();
    let body = body_json(res).await;
    (body["csrfToken"].as_str().unwrap().to_string(), session)
}
