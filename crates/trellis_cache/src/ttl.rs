//! Per-operation TTL policy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Lifetime class for an operation family
///
/// Topology-level listings change rarely and keep long lifetimes;
/// per-entity detail changes faster; health checks go stale in about a
/// minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlClass {
    /// Topology and inventory listings
    Topology,
    /// Per-entity detail and status lookups
    Entity,
    /// Health and status checks
    Health,
}

impl TtlClass {
    /// Default lifetime for the class
    #[must_use]
    pub const fn ttl(self) -> Duration {
        match self {
            Self::Topology => Duration::from_secs(1800),
            Self::Entity => Duration::from_secs(300),
            Self::Health => Duration::from_secs(60),
        }
    }
}

/// Static table mapping operation names to cache lifetimes
///
/// Supplied at construction time; the cache never infers lifetimes at
/// runtime beyond this table and its default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtlPolicy {
    /// Class assignment per operation name
    pub classes: HashMap<String, TtlClass>,
    /// Exact lifetime overrides per operation name (beats class)
    pub overrides: HashMap<String, Duration>,
    /// Lifetime for operation names absent from both tables
    pub default: Duration,
}

impl TtlPolicy {
    /// Create a policy with the standard ten-minute default
    #[must_use]
    pub fn new() -> Self {
        Self {
            classes: HashMap::new(),
            overrides: HashMap::new(),
            default: Duration::from_secs(600),
        }
    }

    /// Assign a class to an operation name
    #[must_use]
    pub fn with_class(mut self, name: impl Into<String>, class: TtlClass) -> Self {
        self.classes.insert(name.into(), class);
        self
    }

    /// Set an exact lifetime for an operation name
    #[must_use]
    pub fn with_ttl(mut self, name: impl Into<String>, ttl: Duration) -> Self {
        self.overrides.insert(name.into(), ttl);
        self
    }

    /// Set the default lifetime
    #[must_use]
    pub fn with_default(mut self, ttl: Duration) -> Self {
        self.default = ttl;
        self
    }

    /// Look up the lifetime for an operation name
    #[must_use]
    pub fn ttl_for(&self, name: &str) -> Duration {
        if let Some(ttl) = self.overrides.get(name) {
            return *ttl;
        }
        if let Some(class) = self.classes.get(name) {
            return class.ttl();
        }
        self.default
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self::new()
    }
}
