use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::auth::VerifiedIdentity;
use crate::csrf::session::bearer_token;
use crate::pipeline::Stage;
use crate::state::AppState;

/// JWT authentication stage.
///
/// Verifies a `Bearer` token when one is presented and attaches a
/// [`VerifiedIdentity`] plus, for active users, an
/// [`AuthenticatedPrincipal`](crate::auth::AuthenticatedPrincipal) to the
/// request extensions. A missing, expired or forged token never rejects the
/// request: it continues anonymously and later stages decide.
pub async fn jwt_auth_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let stage = Stage::Authentication.as_str();

    let claims = match bearer_token(req.headers()) {
        None => None,
        Some(token) => match state.jwt.verify(token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                state.metrics.inc_auth_invalid();
                tracing::debug!(stage, error = %e, "bearer token rejected; continuing anonymously");
                None
            }
        },
    };

    if let Some(claims) = claims {
        req.extensions_mut().insert(VerifiedIdentity::from(&claims));
        match state.users.resolve_authenticated_principal(&claims).await {
            Ok(Some(principal)) => {
                tracing::debug!(stage, user = %principal.username, "principal attached");
                req.extensions_mut().insert(principal);
            }
            Ok(None) => tracing::debug!(stage, subject = %claims.sub, "no active user for token subject"),
            Err(e) => tracing::warn!(stage, error = %e, "user lookup failed; continuing without principal"),
        }
    }

    next.run(req).await
}
