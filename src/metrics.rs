use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Security pipeline counters for monitoring
#[derive(Clone)]
pub struct Metrics {
    pub tokens_issued: Arc<AtomicU64>,
    pub tokens_refreshed: Arc<AtomicU64>,
    pub csrf_passed: Arc<AtomicU64>,
    pub csrf_missing: Arc<AtomicU64>,
    pub csrf_mismatch: Arc<AtomicU64>,
    pub origin_rejected: Arc<AtomicU64>,
    pub auth_invalid: Arc<AtomicU64>,
    pub fields_sanitized: Arc<AtomicU64>,
    pub sanitizer_failures: Arc<AtomicU64>,
    pub records_purged: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            tokens_issued: Arc::new(AtomicU64::new(0)),
            tokens_refreshed: Arc::new(AtomicU64::new(0)),
            csrf_passed: Arc::new(AtomicU64::new(0)),
            csrf_missing: Arc::new(AtomicU64::new(0)),
            csrf_mismatch: Arc::new(AtomicU64::new(0)),
            origin_rejected: Arc::new(AtomicU64::new(0)),
            auth_invalid: Arc::new(AtomicU64::new(0)),
            fields_sanitized: Arc::new(AtomicU64::new(0)),
            sanitizer_failures: Arc::new(AtomicU64::new(0)),
            records_purged: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }

    pub fn inc_tokens_issued(&self) {
        self.tokens_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_tokens_refreshed(&self) {
        self.tokens_refreshed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_csrf_passed(&self) {
        self.csrf_passed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_csrf_missing(&self) {
        self.csrf_missing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_csrf_mismatch(&self) {
        self.csrf_mismatch.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_origin_rejected(&self) {
        self.origin_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_auth_invalid(&self) {
        self.auth_invalid.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_fields_sanitized(&self, count: u64) {
        self.fields_sanitized.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_sanitizer_failures(&self, count: u64) {
        self.sanitizer_failures.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_records_purged(&self, count: u64) {
        self.records_purged.fetch_add(count, Ordering::Relaxed);
    }

    pub fn get_snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tokens_issued: self.tokens_issued.load(Ordering::Relaxed),
            tokens_refreshed: self.tokens_refreshed.load(Ordering::Relaxed),
            csrf_passed: self.csrf_passed.load(Ordering::Relaxed),
            csrf_missing: self.csrf_missing.load(Ordering::Relaxed),
            csrf_mismatch: self.csrf_mismatch.load(Ordering::Relaxed),
            origin_rejected: self.origin_rejected.load(Ordering::Relaxed),
            auth_invalid: self.auth_invalid.load(Ordering::Relaxed),
            fields_sanitized: self.fields_sanitized.load(Ordering::Relaxed),
            sanitizer_failures: self.sanitizer_failures.load(Ordering::Relaxed),
            records_purged: self.records_purged.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub tokens_issued: u64,
    pub tokens_refreshed: u64,
    pub csrf_passed: u64,
    pub csrf_missing: u64,
    pub csrf_mismatch: u64,
    pub origin_rejected: u64,
    pub auth_invalid: u64,
    pub fields_sanitized: u64,
    pub sanitizer_failures: u64,
    pub records_purged: u64,
    pub uptime_seconds: u64,
}
