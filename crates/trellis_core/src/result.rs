//! Operation results.

use crate::params::Params;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Degradation strategy applied to a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Degradation {
    /// Bounded first page plus a continuation cursor
    ProgressiveDisclosure,
    /// Deterministic representative subset of the full result
    Sampling,
    /// Structured guidance instead of raw data
    Fallback,
}

/// Outcome of one operation request
///
/// Produced exactly once per request per coordination round. Retries produce
/// intermediate discarded attempts, not multiple results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Operation name
    pub name: String,
    /// Parameters the operation ran with (echoed)
    pub params: Params,
    /// Whether the operation succeeded
    pub succeeded: bool,
    /// Payload on success
    pub payload: Option<serde_json::Value>,
    /// Error message on failure
    pub error: Option<String>,
    /// Wall time spent on this request
    pub elapsed: Duration,
    /// Whether the result was served from cache
    pub from_cache: bool,
    /// Degradation strategy applied, if any
    pub degraded: Option<Degradation>,
    /// Invoke attempts made (0 for cache hits)
    pub attempts: u32,
    /// Completion timestamp
    pub completed_at: DateTime<Utc>,
}

impl OperationResult {
    /// Build a successful result
    #[must_use]
    pub fn success(
        name: impl Into<String>,
        params: Params,
        payload: serde_json::Value,
        elapsed: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            succeeded: true,
            payload: Some(payload),
            error: None,
            elapsed,
            from_cache: false,
            degraded: None,
            attempts,
            completed_at: Utc::now(),
        }
    }

    /// Build a failed result
    #[must_use]
    pub fn failure(
        name: impl Into<String>,
        params: Params,
        error: impl Into<String>,
        elapsed: Duration,
        attempts: u32,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            succeeded: false,
            payload: None,
            error: Some(error.into()),
            elapsed,
            from_cache: false,
            degraded: None,
            attempts,
            completed_at: Utc::now(),
        }
    }

    /// Build a result served from cache
    #[must_use]
    pub fn cached(name: impl Into<String>, params: Params, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            params,
            succeeded: true,
            payload: Some(payload),
            error: None,
            elapsed: Duration::ZERO,
            from_cache: true,
            degraded: None,
            attempts: 0,
            completed_at: Utc::now(),
        }
    }

    /// Mark the result as degraded
    #[must_use]
    pub fn with_degradation(mut self, degradation: Degradation) -> Self {
        self.degraded = Some(degradation);
        self
    }

    /// Check whether the result carries a degradation marker
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}
