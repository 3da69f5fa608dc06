//! Operation requests.

use crate::params::Params;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A named operation to run against the remote system
///
/// Requests are constructed by the caller per coordination round and are
/// immutable after submission. Dependencies reference other requests in the
/// same round by operation name and must form a DAG.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Name of the remote capability to invoke
    pub name: String,
    /// Structured parameters
    pub params: Params,
    /// Informational priority (higher runs earlier within a batch)
    pub priority: i32,
    /// Names of operations whose results must be available first
    pub depends_on: Vec<String>,
    /// Override for the cache lifetime of this request's result
    pub cache_ttl_override: Option<Duration>,
    /// Maximum invoke attempts before declaring terminal failure
    pub retry_budget: u32,
}

impl OperationRequest {
    /// Create a request with default priority and retry budget
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Params::new(),
            priority: 0,
            depends_on: Vec::new(),
            cache_ttl_override: None,
            retry_budget: 3,
        }
    }

    /// Set the parameters
    #[must_use]
    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// Add a single parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key, value);
        self
    }

    /// Set the priority
    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Add a dependency on another request's result
    #[must_use]
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.push(name.into());
        self
    }

    /// Override the cache TTL for this request
    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl_override = Some(ttl);
        self
    }

    /// Set the retry budget
    #[must_use]
    pub fn with_retry_budget(mut self, budget: u32) -> Self {
        self.retry_budget = budget.max(1);
        self
    }

    /// Check whether the request has no dependencies
    #[must_use]
    pub fn is_independent(&self) -> bool {
        self.depends_on.is_empty()
    }
}
