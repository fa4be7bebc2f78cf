//! Storage of live CSRF token records.
//!
//! The store is injected as `Arc<dyn CsrfTokenStore>` so the in-memory default
//! can be replaced by a shared backend without touching the service or the
//! middleware. Implementations must make `put`, `get` and `delete` atomic per
//! session key; racing writers resolve to last-write-wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::session::SessionKey;
use super::token::CsrfToken;

#[derive(Debug, Clone)]
pub struct CsrfTokenRecord {
    pub session_key: SessionKey,
    pub token: CsrfToken,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CsrfTokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("token store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CsrfTokenStore: Send + Sync {
    /// Insert or overwrite the record for `key`.
    async fn put(&self, key: &SessionKey, record: CsrfTokenRecord) -> Result<(), StoreError>;

    /// Live record for `key`. Expired records are reported as absent.
    async fn get(&self, key: &SessionKey) -> Result<Option<CsrfTokenRecord>, StoreError>;

    async fn delete(&self, key: &SessionKey) -> Result<(), StoreError>;

    /// Drop every record expired at `now`; returns how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Process-local store on a sharded concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    records: DashMap<SessionKey, CsrfTokenRecord>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held, expired ones included until they are evicted.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl CsrfTokenStore for InMemoryTokenStore {
    async fn put(&self, key: &SessionKey, record: CsrfTokenRecord) -> Result<(), StoreError> {
        self.records.insert(key.clone(), record);
        Ok(())
    }

    async fn get(&self, key: &SessionKey) -> Result<Option<CsrfTokenRecord>, StoreError> {
        let now = Utc::now();
        {
            // shard read guard must be released before remove_if
            let Some(entry) = self.records.get(key) else {
                return Ok(None);
            };
            if !entry.is_expired_at(now) {
                return Ok(Some(entry.value().clone()));
            }
        }
        // A concurrent put may have replaced the record in between; only evict
        // if what is stored now is still expired.
        self.records.remove_if(key, |_, record| record.is_expired_at(now));
        Ok(None)
    }

    async fn delete(&self, key: &SessionKey) -> Result<(), StoreError> {
        self.records.remove(key);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut removed = 0usize;
        self.records.retain(|_, record| {
            let keep = !record.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(key: &SessionKey, issued_at: DateTime<Utc>, ttl: Duration) -> CsrfTokenRecord {
        CsrfTokenRecord {
            session_key: key.clone(),
            token: CsrfToken::generate(32),
            issued_at,
            expires_at: issued_at + ttl,
        }
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = InMemoryTokenStore::new();
        let key = SessionKey::new_guest();
        assert!(store.get(&key).await.unwrap().is_none());

        let rec = record(&key, Utc::now(), Duration::minutes(30));
        store.put(&key, rec.clone()).await.unwrap();
        let fetched = store.get(&key).await.unwrap().unwrap();
        assert_eq!(fetched.token, rec.token);
        assert_eq!(fetched.session_key, key);

        store.delete(&key).await.unwrap();
        assert!(store.get(&key).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = InMemoryTokenStore::new();
        let key = SessionKey::new_guest();
        let first = record(&key, Utc::now(), Duration::minutes(30));
        let second = record(&key, Utc::now(), Duration::minutes(30));
        store.put(&key, first).await.unwrap();
        store.put(&key, second.clone()).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key).await.unwrap().unwrap().token, second.token);
    }

    #[tokio::test]
    async fn test_expired_record_is_absent_and_evicted() {
        let store = InMemoryTokenStore::new();
        let key = SessionKey::new_guest();
        let stale = record(&key, Utc::now() - Duration::minutes(31), Duration::minutes(30));
        store.put(&key, stale).await.unwrap();
        assert_eq!(store.len(), 1);

        assert!(store.get(&key).await.unwrap().is_none());
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let store = InMemoryTokenStore::new();
        let now = Utc::now();
        for i in 0..10 {
            let key = SessionKey::new_guest();
            let issued = if i % 2 == 0 { now - Duration::hours(1) } else { now };
            store.put(&key, record(&key, issued, Duration::minutes(30))).await.unwrap();
        }
        assert_eq!(store.purge_expired(now).await.unwrap(), 5);
        assert_eq!(store.len(), 5);
        assert_eq!(store.purge_expired(now).await.unwrap(), 0);
    }

    #[test]
    fn test_expiry_boundary() {
        let key = SessionKey::new_guest();
        let now = Utc::now();
        let rec = record(&key, now, Duration::seconds(1800));
        assert!(!rec.is_expired_at(now));
        assert!(rec.is_expired_at(rec.expires_at));
    }
}
