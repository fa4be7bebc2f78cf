//! CSRF enforcement stage.
//!
//! State-changing requests must echo the live token of their session. The
//! session key is resolved the same way the issuing endpoint resolves it, so
//! a token handed out by `/api/csrf/token` validates on the next POST from
//! the same caller.

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::VerifiedIdentity;
use crate::csrf::{cookie_matches, header_candidate, truncate_token};
use crate::error::AppError;
use crate::pipeline::Stage;
use crate::state::AppState;

/// Methods that must carry a token.
pub fn requires_csrf(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

pub async fn csrf_protection_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let stage = Stage::Csrf.as_str();

    if !requires_csrf(req.method()) {
        return next.run(req).await;
    }
    // exemption is decided before any token lookup
    if state.config.csrf.is_exempt(req.uri().path()) {
        tracing::trace!(stage, path = %req.uri().path(), "path exempt from CSRF");
        return next.run(req).await;
    }

    let session = state.resolver.resolve(req.headers(), req.extensions().get::<VerifiedIdentity>());
    let Some((candidate, source)) = header_candidate(req.headers()) else {
        state.metrics.inc_csrf_missing();
        tracing::info!(stage, session = %session.key, method = %req.method(), path = %req.uri().path(), "CSRF token missing");
        return AppError::CsrfTokenMissing.into_response();
    };

    if state.config.csrf.double_submit_cookie && !cookie_matches(req.headers(), &candidate) {
        state.metrics.inc_csrf_mismatch();
        tracing::info!(
            stage,
            session = %session.key,
            source,
            path = %req.uri().path(),
            "CSRF header does not match the double-submit cookie"
        );
        return AppError::CsrfTokenMismatch.into_response();
    }

    match state.csrf.validate_token(&session.key, &candidate).await {
        Ok(true) => {
            state.metrics.inc_csrf_passed();
            tracing::debug!(stage, session = %session.key, source, "CSRF token accepted");
            next.run(req).await
        }
        Ok(false) => {
            state.metrics.inc_csrf_mismatch();
            tracing::info!(
                stage,
                session = %session.key,
                source,
                candidate = %truncate_token(&candidate),
                path = %req.uri().path(),
                "CSRF token invalid or expired"
            );
            AppError::CsrfTokenMismatch.into_response()
        }
        Err(e) => AppError::from(e).into_response(),
    }
}
