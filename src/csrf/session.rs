//! Per-caller correlation keys for CSRF tokens.
//!
//! A session key only scopes tokens; it is not an authentication session.

use axum::http::{header, HeaderMap};
use axum_extra::extract::CookieJar;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

use crate::auth::VerifiedIdentity;

/// Cookie carrying the guest key between requests.
pub const GUEST_SESSION_COOKIE: &str = "CSRF-SESSION";

const JWT_PREFIX: &str = "jwt_";
const GUEST_PREFIX: &str = "guest_";
/// Hex characters kept from the SHA-256 digest (128 bits).
const JWT_KEY_HEX_LEN: usize = 32;

/// `jwt_<hex>` or `guest_<uuid>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn new_guest() -> Self {
        Self(format!("{}{}", GUEST_PREFIX, Uuid::new_v4()))
    }

    /// Accepts only `guest_` followed by a parseable UUID.
    pub fn parse_guest(raw: &str) -> Option<Self> {
        let id = raw.strip_prefix(GUEST_PREFIX)?;
        let uuid = Uuid::parse_str(id).ok()?;
        Some(Self(format!("{}{}", GUEST_PREFIX, uuid)))
    }

    fn from_digest(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        let mut hex = hex::encode(hasher.finalize());
        hex.truncate(JWT_KEY_HEX_LEN);
        Self(format!("{}{}", JWT_PREFIX, hex))
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of resolving a request. `minted` is set when a new guest key was
/// generated and the caller still has to receive it via cookie.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub key: SessionKey,
    pub minted: bool,
}

/// Derives the [`SessionKey`] of a request. Stateless; never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionKeyResolver;

impl SessionKeyResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolution order:
    /// 1. verified identity from the authentication stage → hash of subject and issued-at
    /// 2. unverified bearer token → hash of the raw token
    /// 3. `CSRF-SESSION` cookie with a well-formed guest key
    /// 4. freshly minted guest key
    pub fn resolve(&self, headers: &HeaderMap, verified: Option<&VerifiedIdentity>) -> ResolvedSession {
        if let Some(identity) = verified {
            return ResolvedSession { key: Self::key_for_identity(identity), minted: false };
        }
        if let Some(token) = bearer_token(headers) {
            return ResolvedSession { key: Self::key_for_raw_token(token), minted: false };
        }
        if let Some(key) = Self::guest_from_cookie(headers) {
            return ResolvedSession { key, minted: false };
        }
        let key = SessionKey::new_guest();
        tracing::debug!(session = %key, "minted guest session key");
        ResolvedSession { key, minted: true }
    }

    pub fn key_for_identity(identity: &VerifiedIdentity) -> SessionKey {
        let epoch = identity.issued_at.to_string();
        SessionKey::from_digest(&[b"sub:", identity.subject.as_bytes(), b"|iat:", epoch.as_bytes()])
    }

    pub fn key_for_raw_token(token: &str) -> SessionKey {
        SessionKey::from_digest(&[b"raw:", token.as_bytes()])
    }

    fn guest_from_cookie(headers: &HeaderMap) -> Option<SessionKey> {
        let jar = CookieJar::from_headers(headers);
        let cookie = jar.get(GUEST_SESSION_COOKIE)?;
        SessionKey::parse_guest(cookie.value())
    }
}

/// Raw bearer token, if the Authorization header is a well-formed `Bearer` credential.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").or_else(|| value.strip_prefix("bearer "))?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}
