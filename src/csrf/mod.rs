//! CSRF token lifecycle: session keys, token store, token service.
//!
//! Tokens follow the double-submit pattern. The issuing endpoint hands the
//! token out in a readable (non-HttpOnly) cookie and in a response header; a
//! same-origin script echoes it back in one of [`HEADER_NAMES`]. The cookie
//! has to stay readable for that.

pub mod service;
pub mod session;
pub mod store;
pub mod token;

use axum::http::HeaderMap;
use axum_extra::extract::CookieJar;

pub use service::{CsrfTokenService, IssueError};
pub use session::{ResolvedSession, SessionKey, SessionKeyResolver, GUEST_SESSION_COOKIE};
pub use store::{CsrfTokenRecord, CsrfTokenStore, InMemoryTokenStore, StoreError};
pub use token::{constant_time_eq, truncate_token, CsrfToken};

/// Request headers checked for a candidate token, in order.
pub const HEADER_NAMES: [&str; 2] = ["X-XSRF-TOKEN", "X-CSRF-TOKEN"];
/// Double-submit cookies, in order. Both names are kept for older clients.
pub const COOKIE_NAMES: [&str; 2] = ["XSRF-TOKEN", "CSRF-TOKEN"];

/// First non-empty token among [`HEADER_NAMES`], with the header it came from.
///
/// Only a header counts as a candidate: browsers attach cookies on their
/// own, scripts from a foreign origin cannot set these headers.
pub fn header_candidate(headers: &HeaderMap) -> Option<(String, &'static str)> {
    HEADER_NAMES.iter().find_map(|&name| {
        let value = headers.get(name)?.to_str().ok()?.trim();
        (!value.is_empty()).then(|| (value.to_string(), name))
    })
}

/// First non-empty value among [`COOKIE_NAMES`].
pub fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    COOKIE_NAMES.iter().find_map(|&name| {
        let value = jar.get(name)?.value().trim().to_string();
        (!value.is_empty()).then_some(value)
    })
}

/// Double-submit check: a token cookie is present and equals `candidate`.
pub fn cookie_matches(headers: &HeaderMap, candidate: &str) -> bool {
    cookie_token(headers).is_some_and(|cookie| constant_time_eq(cookie.as_bytes(), candidate.as_bytes()))
}
