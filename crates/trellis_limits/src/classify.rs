//! Static risk classification of planned requests.

use crate::strategy::SampleBounds;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use trellis_core::{Degradation, OperationRequest};

/// Known limitation categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitationKind {
    /// Result size has no bound or exceeds the per-operation threshold
    UnboundedResult,
    /// One logical query fans out into one remote call per related entity
    FanOutRelationship,
    /// Paginated collection queried without a caller-supplied bound
    LargeQuery,
}

impl LimitationKind {
    /// Selection priority; lower wins
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::UnboundedResult => 0,
            Self::FanOutRelationship => 1,
            Self::LargeQuery => 2,
        }
    }

    /// Degradation strategy this category routes to
    #[must_use]
    pub const fn strategy(self) -> Degradation {
        match self {
            Self::UnboundedResult | Self::LargeQuery => Degradation::ProgressiveDisclosure,
            Self::FanOutRelationship => Degradation::Sampling,
        }
    }
}

/// Estimated severity of a matched limitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Degradation is precautionary
    Low,
    /// Degradation is recommended
    Medium,
    /// Direct execution would likely fail or flood the remote system
    High,
}

/// One matched limitation, kept for diagnostics within a round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitationRecord {
    /// Matched category
    pub kind: LimitationKind,
    /// Operation that matched
    pub operation: String,
    /// Estimated severity
    pub severity: Severity,
    /// Human-readable match detail
    pub detail: String,
}

/// Risk profile of one operation name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskRule {
    /// Categories this operation can match
    pub categories: Vec<LimitationKind>,
    /// Requested result sizes above this count as unbounded
    pub result_limit: usize,
    /// Array-valued parameter whose length measures fan-out
    pub fan_out_param: Option<String>,
    /// Fan-out sizes above this trigger degradation
    pub fan_out_threshold: usize,
    /// Page size for progressive disclosure of this operation
    pub page_size: usize,
    /// Sampling bounds for this operation
    pub sample_bounds: SampleBounds,
    /// Route straight to fallback guidance instead of any data strategy
    pub force_fallback: bool,
}

impl RiskRule {
    /// Create a rule for the given categories with standard thresholds
    #[must_use]
    pub fn new(categories: Vec<LimitationKind>) -> Self {
        Self {
            categories,
            result_limit: 100,
            fan_out_param: None,
            fan_out_threshold: 10,
            page_size: 25,
            sample_bounds: SampleBounds::default(),
            force_fallback: false,
        }
    }

    /// Set the unbounded-result threshold
    #[must_use]
    pub fn with_result_limit(mut self, limit: usize) -> Self {
        self.result_limit = limit;
        self
    }

    /// Measure fan-out by the length of the named array parameter
    #[must_use]
    pub fn with_fan_out_param(mut self, param: impl Into<String>, threshold: usize) -> Self {
        self.fan_out_param = Some(param.into());
        self.fan_out_threshold = threshold;
        self
    }

    /// Set the progressive-disclosure page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Set the sampling bounds
    #[must_use]
    pub fn with_sample_bounds(mut self, bounds: SampleBounds) -> Self {
        self.sample_bounds = bounds;
        self
    }

    /// Always answer this operation with fallback guidance
    #[must_use]
    pub fn with_forced_fallback(mut self) -> Self {
        self.force_fallback = true;
        self
    }
}

/// Static table mapping operation names to risk profiles
///
/// Classification is fixed configuration, never inferred at runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskTable {
    rules: HashMap<String, RiskRule>,
}

impl RiskTable {
    /// Create an empty table (nothing is considered risky)
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule for an operation name
    #[must_use]
    pub fn with_rule(mut self, name: impl Into<String>, rule: RiskRule) -> Self {
        self.rules.insert(name.into(), rule);
        self
    }

    /// Look up the rule for an operation name
    #[must_use]
    pub fn rule_for(&self, name: &str) -> Option<&RiskRule> {
        self.rules.get(name)
    }
}

/// Batch-level strategy choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySelection {
    /// Strategy to apply to flagged requests
    pub strategy: Degradation,
    /// Category that won the selection
    pub kind: LimitationKind,
    /// Operation whose match drove the selection
    pub operation: String,
}

/// Matches planned requests against the risk table
///
/// Pure and re-entrant; holds only the static table.
#[derive(Debug, Clone, Default)]
pub struct LimitationDetector {
    table: RiskTable,
}

impl LimitationDetector {
    /// Create a detector over the given table
    #[must_use]
    pub fn new(table: RiskTable) -> Self {
        Self { table }
    }

    /// Look up the rule for an operation name
    #[must_use]
    pub fn rule_for(&self, name: &str) -> Option<&RiskRule> {
        self.table.rule_for(name)
    }

    /// Classify one request against the table
    ///
    /// A request with no rule matches nothing.
    #[must_use]
    pub fn classify(&self, request: &OperationRequest) -> Vec<LimitationRecord> {
        let Some(rule) = self.table.rule_for(&request.name) else {
            return Vec::new();
        };

        let mut records = Vec::new();

        for kind in &rule.categories {
            match kind {
                LimitationKind::UnboundedResult => {
                    let requested = request
                        .params
                        .get("limit")
                        .and_then(serde_json::Value::as_u64);
                    match requested {
                        None => records.push(LimitationRecord {
                            kind: *kind,
                            operation: request.name.clone(),
                            severity: Severity::High,
                            detail: "no result-size bound supplied".to_string(),
                        }),
                        Some(limit) if limit as usize > rule.result_limit => {
                            records.push(LimitationRecord {
                                kind: *kind,
                                operation: request.name.clone(),
                                severity: Severity::High,
                                detail: format!(
                                    "requested limit {} exceeds threshold {}",
                                    limit, rule.result_limit
                                ),
                            });
                        }
                        Some(_) => {}
                    }
                }
                LimitationKind::FanOutRelationship => {
                    let Some(param) = &rule.fan_out_param else {
                        continue;
                    };
                    let entities = request
                        .params
                        .get(param)
                        .and_then(serde_json::Value::as_array)
                        .map_or(0, Vec::len);
                    if entities > rule.fan_out_threshold {
                        records.push(LimitationRecord {
                            kind: *kind,
                            operation: request.name.clone(),
                            severity: Severity::Medium,
                            detail: format!(
                                "{} entities implies {} remote calls (threshold {})",
                                entities, entities, rule.fan_out_threshold
                            ),
                        });
                    }
                }
                LimitationKind::LargeQuery => {
                    if !request.params.contains_key("limit") {
                        records.push(LimitationRecord {
                            kind: *kind,
                            operation: request.name.clone(),
                            severity: Severity::Low,
                            detail: "paginated collection queried without a bound".to_string(),
                        });
                    }
                }
            }
        }

        records
    }

    /// Classify a planned batch and select the batch-level strategy
    ///
    /// The winning category is the highest-priority match; first match wins
    /// among equals. Losing records are still returned for diagnostics.
    #[must_use]
    pub fn select(
        &self,
        requests: &[OperationRequest],
    ) -> (Option<StrategySelection>, Vec<LimitationRecord>) {
        let mut records: Vec<LimitationRecord> = Vec::new();
        for request in requests {
            records.extend(self.classify(request));
        }

        let winner = records
            .iter()
            .min_by_key(|record| record.kind.priority())
            .map(|record| {
                let forced = self
                    .table
                    .rule_for(&record.operation)
                    .is_some_and(|rule| rule.force_fallback);
                StrategySelection {
                    strategy: if forced {
                        trellis_core::Degradation::Fallback
                    } else {
                        record.kind.strategy()
                    },
                    kind: record.kind,
                    operation: record.operation.clone(),
                }
            });

        (winner, records)
    }
}
