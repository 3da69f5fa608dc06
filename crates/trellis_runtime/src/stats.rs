//! Cumulative coordination statistics.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Counters accumulated across coordination rounds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationStats {
    /// Requests submitted across all rounds
    pub total_requests: u64,
    /// Requests that produced a successful result
    pub successful_requests: u64,
    /// Results served from cache
    pub cache_hits: u64,
    /// Batches that actually ran more than one request concurrently
    pub parallel_batches: u64,
    /// Coordination rounds completed
    pub rounds: u64,
}

impl CoordinationStats {
    /// Fraction of requests that succeeded; 0.0 before any request
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }
}

/// One round's contribution to the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundTally {
    /// Requests in the round
    pub requests: u64,
    /// Successful results
    pub succeeded: u64,
    /// Cache-served results
    pub cache_hits: u64,
    /// Multi-request parallel batches
    pub parallel_batches: u64,
}

/// Cloneable handle to shared statistics
///
/// A round's counters land under one lock acquisition, so a concurrent
/// reader never observes a round half-applied.
#[derive(Clone, Default)]
pub struct StatsHandle {
    inner: Arc<Mutex<CoordinationStats>>,
}

impl StatsHandle {
    /// Create a zeroed handle
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one round's tally atomically
    pub fn record_round(&self, tally: RoundTally) {
        let mut stats = self.inner.lock().unwrap();
        stats.total_requests += tally.requests;
        stats.successful_requests += tally.succeeded;
        stats.cache_hits += tally.cache_hits;
        stats.parallel_batches += tally.parallel_batches;
        stats.rounds += 1;
    }

    /// Consistent snapshot of the counters
    #[must_use]
    pub fn snapshot(&self) -> CoordinationStats {
        self.inner.lock().unwrap().clone()
    }

    /// Reset every counter to zero
    pub fn reset(&self) {
        *self.inner.lock().unwrap() = CoordinationStats::default();
    }
}
