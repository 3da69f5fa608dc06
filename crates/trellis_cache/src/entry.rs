//! Cache entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A cached operation payload with its lifetime metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Cached payload
    pub value: serde_json::Value,
    /// When the entry was written
    pub cached_at: DateTime<Utc>,
    /// Declared lifetime in milliseconds
    pub ttl_ms: u64,
    /// Number of reads since the entry was written
    pub access_count: u64,
}

impl CacheEntry {
    /// Create a new entry
    #[must_use]
    pub fn new(value: serde_json::Value, cached_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value,
            cached_at,
            ttl_ms: ttl.as_millis().min(u128::from(u64::MAX)) as u64,
            access_count: 0,
        }
    }

    /// Declared lifetime
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Check whether the entry has expired at the given instant
    ///
    /// An expired entry behaves identically to a miss.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.cached_at);
        match chrono::Duration::from_std(self.ttl()) {
            Ok(ttl) => age >= ttl,
            Err(_) => false,
        }
    }
}
