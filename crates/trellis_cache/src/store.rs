//! Cache store facade.

use crate::backend::{CacheBackend, MemoryBackend};
use crate::clock::{Clock, SystemClock};
use crate::entry::CacheEntry;
use crate::key::cache_key;
use crate::ttl::TtlPolicy;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};
use trellis_core::Params;

/// Cache hit/miss statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Reads answered from cache
    pub hits: u64,
    /// Reads that found nothing usable
    pub misses: u64,
    /// Entries written
    pub writes: u64,
    /// Entries evicted by pattern invalidation
    pub invalidated: u64,
}

impl CacheStats {
    /// Hit rate over all reads; 0.0 before any read
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 / total as f64
    }
}

/// TTL-keyed cache over a pluggable backend
///
/// Every failure of the backend degrades silently: reads become misses,
/// writes and invalidations become no-ops. Nothing here ever propagates an
/// error to the coordination path.
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    policy: TtlPolicy,
    clock: Arc<dyn Clock>,
    stats: RwLock<CacheStats>,
}

impl CacheStore {
    /// Create a store over the in-memory backend with default policy
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()), TtlPolicy::default())
    }

    /// Create a store over the given backend and TTL policy
    #[must_use]
    pub fn new(backend: Arc<dyn CacheBackend>, policy: TtlPolicy) -> Self {
        Self {
            backend,
            policy,
            clock: Arc::new(SystemClock),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Substitute the clock (tests simulate TTL expiry with this)
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Read a cached payload for an operation and its parameters
    ///
    /// Returns `None` on a miss, an expired entry, or any backend failure.
    pub fn get(&self, name: &str, params: &Params) -> Option<serde_json::Value> {
        let key = match cache_key(name, params) {
            Ok(key) => key,
            Err(err) => {
                warn!(operation = name, %err, "cache key derivation failed, treating as miss");
                self.record_miss();
                return None;
            }
        };

        let entry = match self.backend.load(&key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                self.record_miss();
                return None;
            }
            Err(err) => {
                warn!(operation = name, %err, "cache backend read failed, treating as miss");
                self.record_miss();
                return None;
            }
        };

        if entry.is_expired(self.clock.now()) {
            // Expired entries are misses; eviction is best-effort.
            if let Err(err) = self.backend.delete(&key) {
                debug!(%key, %err, "failed to evict expired entry");
            }
            self.record_miss();
            return None;
        }

        // Access tracking is a side record; its failure never fails a read.
        if let Err(err) = self.backend.touch(&key) {
            debug!(%key, %err, "failed to update access count");
        }

        self.stats.write().unwrap().hits += 1;
        Some(entry.value)
    }

    /// Write a payload through to the cache
    ///
    /// The lifetime comes from the override when present, otherwise from
    /// the per-operation policy. Backend failures degrade to a no-op.
    pub fn set(
        &self,
        name: &str,
        params: &Params,
        value: serde_json::Value,
        ttl_override: Option<Duration>,
    ) {
        let key = match cache_key(name, params) {
            Ok(key) => key,
            Err(err) => {
                warn!(operation = name, %err, "cache key derivation failed, skipping write");
                return;
            }
        };

        let ttl = ttl_override.unwrap_or_else(|| self.policy.ttl_for(name));
        let entry = CacheEntry::new(value, self.clock.now(), ttl);

        match self.backend.store(&key, entry) {
            Ok(()) => {
                self.stats.write().unwrap().writes += 1;
            }
            Err(err) => {
                warn!(operation = name, %err, "cache backend write failed, skipping");
            }
        }
    }

    /// Delete every entry whose key matches the glob pattern
    ///
    /// Returns the number of entries deleted; 0 on backend failure.
    pub fn invalidate_pattern(&self, pattern: &str) -> usize {
        match self.backend.delete_matching(pattern) {
            Ok(deleted) => {
                if deleted > 0 {
                    debug!(pattern, deleted, "invalidated cache entries");
                }
                self.stats.write().unwrap().invalidated += deleted as u64;
                deleted
            }
            Err(err) => {
                warn!(pattern, %err, "cache backend invalidation failed, skipping");
                0
            }
        }
    }

    /// Snapshot of the hit/miss statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats.read().unwrap().clone()
    }

    /// The `n` most-read keys with their access counts
    ///
    /// Empty on backend failure.
    #[must_use]
    pub fn hottest(&self, n: usize) -> Vec<(String, u64)> {
        let mut counts = match self.backend.access_counts() {
            Ok(counts) => counts,
            Err(err) => {
                warn!(%err, "cache backend scan failed, no access report");
                return Vec::new();
            }
        };

        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        counts.truncate(n);
        counts
    }

    fn record_miss(&self) {
        self.stats.write().unwrap().misses += 1;
    }
}
