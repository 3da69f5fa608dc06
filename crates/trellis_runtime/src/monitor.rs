//! Per-round telemetry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use trellis_plan::ResolveWarning;

/// What one coordination round looked like
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSummary {
    /// When the round started
    pub started_at: DateTime<Utc>,
    /// Requests submitted
    pub request_count: usize,
    /// Batches the resolver produced
    pub batch_count: usize,
    /// Successful results
    pub succeeded: usize,
    /// Failed results
    pub failed: usize,
    /// Cache-served results
    pub cache_hits: usize,
    /// Results carrying a degradation marker
    pub degraded: usize,
    /// Resolution warnings (cycles, dangling references)
    pub warnings: Vec<ResolveWarning>,
    /// Wall time for the whole round
    pub elapsed: Duration,
}

/// Bounded history of recent round summaries
pub struct RoundMonitor {
    history: Mutex<VecDeque<RoundSummary>>,
    limit: usize,
}

impl RoundMonitor {
    /// Create a monitor keeping at most `limit` summaries
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            history: Mutex::new(VecDeque::new()),
            limit: limit.max(1),
        }
    }

    /// Record a round, evicting the oldest summary when full
    pub fn record(&self, summary: RoundSummary) {
        let mut history = self.history.lock().unwrap();
        if history.len() == self.limit {
            history.pop_front();
        }
        history.push_back(summary);
    }

    /// The `n` most recent summaries, newest last
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<RoundSummary> {
        let history = self.history.lock().unwrap();
        let skip = history.len().saturating_sub(n);
        history.iter().skip(skip).cloned().collect()
    }

    /// The most recent summary
    #[must_use]
    pub fn last(&self) -> Option<RoundSummary> {
        self.history.lock().unwrap().back().cloned()
    }
}
