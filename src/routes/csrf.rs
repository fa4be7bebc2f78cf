//! Token issuance, refresh and status under `/api/csrf`.
//!
//! These paths are exempt from CSRF enforcement, otherwise a client could
//! never obtain its first token.

use axum::{
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::auth::{MaybeIdentity, VerifiedIdentity};
use crate::csrf::{header_candidate, truncate_token, ResolvedSession, COOKIE_NAMES, GUEST_SESSION_COOKIE, HEADER_NAMES};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::types::{CsrfStatusResponse, CsrfTokenResponse};

fn token_cookie(name: &'static str, value: String, secure: bool, max_age_secs: u64) -> Cookie<'static> {
    // readable by same-origin scripts so they can echo it in a header
    Cookie::build((name, value))
        .path("/")
        .http_only(false)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::seconds(max_age_secs as i64))
        .build()
}

fn guest_session_cookie(session: &ResolvedSession, secure: bool) -> Cookie<'static> {
    Cookie::build((GUEST_SESSION_COOKIE, session.key.as_str().to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

async fn issue(
    state: &AppState,
    identity: Option<&VerifiedIdentity>,
    headers: &HeaderMap,
    jar: CookieJar,
    refresh: bool,
) -> AppResult<Response> {
    let session = state.resolver.resolve(headers, identity);
    if refresh {
        state.csrf.invalidate_token(&session.key).await?;
    }
    let token = state.csrf.generate_token(&session.key).await?;
    if refresh {
        state.metrics.inc_tokens_refreshed();
    } else {
        state.metrics.inc_tokens_issued();
    }
    tracing::info!(session = %session.key, token = %token.truncated(), refresh, "CSRF token handed out");

    let cfg = &state.config.csrf;
    let ttl_secs = state.csrf.ttl().as_secs();
    let mut jar = jar;
    for name in COOKIE_NAMES {
        jar = jar.add(token_cookie(name, token.as_str().to_string(), cfg.cookie_secure, ttl_secs));
    }
    if session.minted {
        jar = jar.add(guest_session_cookie(&session, cfg.cookie_secure));
    }

    let mut response_headers = HeaderMap::new();
    let header_value = HeaderValue::from_str(token.as_str())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("token is not a valid header value: {}", e)))?;
    for name in HEADER_NAMES {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid header name {}: {}", name, e)))?;
        response_headers.insert(name, header_value.clone());
    }

    let body = CsrfTokenResponse {
        success: true,
        csrf_token: token.into_string(),
        expires_in: ttl_secs,
        cookie_names: COOKIE_NAMES.iter().map(|s| s.to_string()).collect(),
        header_names: HEADER_NAMES.iter().map(|s| s.to_string()).collect(),
        message: if refresh {
            "CSRF token refreshed successfully".to_string()
        } else {
            "CSRF token generated successfully".to_string()
        },
    };

    Ok((jar, response_headers, Json(body)).into_response())
}

pub async fn get_token(
    State(state): State<AppState>,
    identity: MaybeIdentity,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<Response> {
    issue(&state, identity.get(), &headers, jar, false).await
}

pub async fn refresh_token(
    State(state): State<AppState>,
    identity: MaybeIdentity,
    headers: HeaderMap,
    jar: CookieJar,
) -> AppResult<Response> {
    issue(&state, identity.get(), &headers, jar, true).await
}

/// Diagnostic view of the caller's session. Never sets cookies and never
/// reveals more than a token prefix.
pub async fn status(
    State(state): State<AppState>,
    identity: MaybeIdentity,
    headers: HeaderMap,
) -> AppResult<Json<CsrfStatusResponse>> {
    let session = state.resolver.resolve(&headers, identity.get());
    let server_token = state.csrf.get_token_for_session(&session.key).await?;
    let header_token = header_candidate(&headers).map(|(token, _)| truncate_token(&token));
    let has_valid_token = server_token.is_some();

    Ok(Json(CsrfStatusResponse {
        success: true,
        csrf_protection_enabled: true,
        has_valid_token,
        session_id: session.key.as_str().to_string(),
        header_token,
        server_token: server_token.map(|t| t.truncated()),
        message: if has_valid_token {
            "CSRF protection is active with valid token".to_string()
        } else {
            "CSRF protection is active but no valid token found".to_string()
        },
    }))
}
