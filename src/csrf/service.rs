use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::session::SessionKey;
use super::store::{CsrfTokenRecord, CsrfTokenStore, StoreError};
use super::token::CsrfToken;
use crate::config::CsrfConfig;

#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("token TTL of {0:?} cannot be represented as an expiry time")]
    TtlOutOfRange(Duration),
}

/// Issues, looks up, validates and invalidates CSRF tokens.
///
/// This is the only component that talks to the [`CsrfTokenStore`]. All
/// operations are in-memory for the default store. Failures are an
/// unavailable store or a TTL too large for an expiry timestamp; callers
/// surface both as a 500.
#[derive(Clone)]
pub struct CsrfTokenService {
    store: Arc<dyn CsrfTokenStore>,
    ttl: Duration,
    token_bytes: usize,
}

impl CsrfTokenService {
    pub fn new(store: Arc<dyn CsrfTokenStore>, ttl: Duration, token_bytes: usize) -> Self {
        Self { store, ttl, token_bytes }
    }

    pub fn from_config(store: Arc<dyn CsrfTokenStore>, cfg: &CsrfConfig) -> Self {
        Self::new(store, cfg.token_ttl(), cfg.token_bytes)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Create a new token for `key`, replacing any previous one.
    pub async fn generate_token(&self, key: &SessionKey) -> Result<CsrfToken, IssueError> {
        let issued_at = Utc::now();
        let expires_at = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| issued_at.checked_add_signed(ttl))
            .ok_or(IssueError::TtlOutOfRange(self.ttl))?;
        let token = CsrfToken::generate(self.token_bytes);
        let record = CsrfTokenRecord { session_key: key.clone(), token: token.clone(), issued_at, expires_at };
        self.store.put(key, record).await?;
        debug!(session = %key, token = %token.truncated(), "CSRF token issued");
        Ok(token)
    }

    pub async fn get_token_for_session(&self, key: &SessionKey) -> Result<Option<CsrfToken>, StoreError> {
        Ok(self.store.get(key).await?.map(|record| record.token))
    }

    /// True iff a live token exists for `key` and equals `candidate`.
    pub async fn validate_token(&self, key: &SessionKey, candidate: &str) -> Result<bool, StoreError> {
        match self.store.get(key).await? {
            Some(record) => Ok(record.token.matches(candidate)),
            None => Ok(false),
        }
    }

    pub async fn invalidate_token(&self, key: &SessionKey) -> Result<(), StoreError> {
        self.store.delete(key).await?;
        debug!(session = %key, "CSRF token invalidated");
        Ok(())
    }

    pub async fn purge_expired(&self) -> Result<usize, StoreError> {
        self.store.purge_expired(Utc::now()).await
    }
}
