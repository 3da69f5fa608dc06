//! Per-operation duration estimates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Static table of believed per-operation durations
///
/// Used only for the speedup estimate reported in resolve metadata; the
/// executor never consults it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurationEstimates {
    /// Believed duration per operation name
    pub per_operation: HashMap<String, Duration>,
    /// Fallback for unknown operation names
    pub default: Duration,
}

impl DurationEstimates {
    /// Create a table with a half-second fallback
    #[must_use]
    pub fn new() -> Self {
        Self {
            per_operation: HashMap::new(),
            default: Duration::from_millis(500),
        }
    }

    /// Set the estimate for an operation name
    #[must_use]
    pub fn with_estimate(mut self, name: impl Into<String>, duration: Duration) -> Self {
        self.per_operation.insert(name.into(), duration);
        self
    }

    /// Set the fallback estimate
    #[must_use]
    pub fn with_default(mut self, duration: Duration) -> Self {
        self.default = duration;
        self
    }

    /// Look up the estimate for an operation name
    #[must_use]
    pub fn estimate_for(&self, name: &str) -> Duration {
        self.per_operation.get(name).copied().unwrap_or(self.default)
    }
}

impl Default for DurationEstimates {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_name_gets_default() {
        let estimates = DurationEstimates::new();
        assert_eq!(estimates.estimate_for("anything"), Duration::from_millis(500));
    }

    #[test]
    fn test_known_name() {
        let estimates =
            DurationEstimates::new().with_estimate("list_devices", Duration::from_secs(2));
        assert_eq!(estimates.estimate_for("list_devices"), Duration::from_secs(2));
        assert_eq!(estimates.estimate_for("other"), Duration::from_millis(500));
    }
}
