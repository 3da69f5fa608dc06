//! Context propagation for dependent operations.
//!
//! How a named prior result parameterizes a dependent step is deployment
//! configuration, not core logic: each dependency name maps to extraction
//! rules (a JSON pointer into the dependency's payload and the parameter
//! name to inject it under). Dependencies without a configured rule
//! contribute their whole payload under their own name.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use trellis_core::{OperationResult, Params};

/// One extraction rule for a dependency's payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextRule {
    /// JSON pointer into the dependency's payload (e.g. `/results/0/id`)
    pub source_pointer: String,
    /// Parameter name to inject the extracted value under
    pub target_param: String,
}

impl ContextRule {
    /// Create a rule
    #[must_use]
    pub fn new(source_pointer: impl Into<String>, target_param: impl Into<String>) -> Self {
        Self {
            source_pointer: source_pointer.into(),
            target_param: target_param.into(),
        }
    }
}

/// Extraction rules keyed by dependency operation name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextRules {
    rules: IndexMap<String, Vec<ContextRule>>,
}

impl ContextRules {
    /// Create an empty rule set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule for a dependency name
    #[must_use]
    pub fn with_rule(mut self, dependency: impl Into<String>, rule: ContextRule) -> Self {
        self.rules.entry(dependency.into()).or_default().push(rule);
        self
    }

    /// Extract injectable parameters from prior results
    ///
    /// Returns the merged context plus the dependencies (or pointer paths)
    /// that could not contribute: absent results, failed results, and
    /// pointers that matched nothing. Extraction is deterministic for a
    /// given rule set and prior-result map.
    #[must_use]
    pub fn extract(
        &self,
        depends_on: &[String],
        prior: &IndexMap<String, OperationResult>,
    ) -> (Params, Vec<String>) {
        let mut context = Params::new();
        let mut missing = Vec::new();

        for dependency in depends_on {
            let payload = match prior.get(dependency) {
                Some(result) if result.succeeded => result.payload.as_ref(),
                _ => None,
            };
            let Some(payload) = payload else {
                missing.push(dependency.clone());
                continue;
            };

            match self.rules.get(dependency) {
                Some(rules) => {
                    for rule in rules {
                        match payload.pointer(&rule.source_pointer) {
                            Some(value) => {
                                context.insert(rule.target_param.clone(), value.clone());
                            }
                            None => {
                                missing.push(format!("{}{}", dependency, rule.source_pointer));
                            }
                        }
                    }
                }
                None => {
                    context.insert(dependency.clone(), payload.clone());
                }
            }
        }

        (context, missing)
    }
}
