//! Wave-based dependency resolution.

use crate::estimate::DurationEstimates;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;
use trellis_core::OperationRequest;

/// Warning surfaced by resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolveWarning {
    /// A dependency cycle involving the named operations
    Cycle {
        /// Operations trapped in the cycle
        members: Vec<String>,
    },
    /// A dependency on an operation that was never submitted
    MissingDependency {
        /// Operation carrying the dangling reference
        operation: String,
        /// The dependency that does not exist in this round
        missing: String,
    },
    /// Two requests in one round share an operation name
    ///
    /// Names key the round's dependency and result maps, so later results
    /// shadow earlier ones.
    DuplicateName {
        /// The shared operation name
        operation: String,
    },
}

/// Metadata reported alongside the batches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveMeta {
    /// Number of batches produced
    pub batch_count: usize,
    /// Requests that share a batch with at least one other request
    pub parallelizable: usize,
    /// (sum of believed durations) / (sum of per-batch maxima)
    pub speedup_estimate: f64,
    /// Cycle and dangling-reference warnings
    pub warnings: Vec<ResolveWarning>,
}

impl ResolveMeta {
    /// Check whether resolution flagged a malformed graph
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Ordered batches plus resolve metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPlan {
    /// Batches in execution order; members of one batch are independent
    pub batches: Vec<Vec<OperationRequest>>,
    /// Resolution metadata
    pub meta: ResolveMeta,
}

/// Converts a round of requests into parallel-executable waves
///
/// Pure and re-entrant: holds only its static estimate table, so it is
/// safely callable from concurrent coordination rounds.
#[derive(Debug, Clone, Default)]
pub struct DependencyResolver {
    estimates: DurationEstimates,
}

impl DependencyResolver {
    /// Create a resolver with default duration estimates
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a resolver with the given estimate table
    #[must_use]
    pub fn with_estimates(estimates: DurationEstimates) -> Self {
        Self { estimates }
    }

    /// Resolve a round of requests into ordered batches
    ///
    /// Each pass collects every not-yet-scheduled request whose dependencies
    /// are all already scheduled. When a pass collects nothing but requests
    /// remain, the graph is malformed (cycle or dangling reference): the
    /// remainder is forced into a final batch and the condition is flagged
    /// in the metadata. Forcing is recovery, not correctness; callers must
    /// inspect the warnings.
    #[must_use]
    pub fn resolve(&self, requests: &[OperationRequest]) -> ResolvedPlan {
        if requests.is_empty() {
            return ResolvedPlan {
                batches: vec![Vec::new()],
                meta: ResolveMeta {
                    batch_count: 1,
                    parallelizable: 0,
                    speedup_estimate: 1.0,
                    warnings: Vec::new(),
                },
            };
        }

        let mut warnings: Vec<ResolveWarning> = Vec::new();
        let mut submitted: IndexSet<&str> = IndexSet::new();
        for request in requests {
            if !submitted.insert(request.name.as_str()) {
                warnings.push(ResolveWarning::DuplicateName {
                    operation: request.name.clone(),
                });
            }
        }

        let mut scheduled: IndexSet<String> = IndexSet::new();
        let mut remaining: Vec<&OperationRequest> = requests.iter().collect();
        let mut batches: Vec<Vec<OperationRequest>> = Vec::new();

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<&OperationRequest>, Vec<&OperationRequest>) = remaining
                .iter()
                .copied()
                .partition(|r| r.depends_on.iter().all(|dep| scheduled.contains(dep)));

            if ready.is_empty() {
                // Malformed graph. Classify each unresolved edge, then force
                // the remainder so the caller still gets partial results.
                let mut cycle_members: Vec<String> = Vec::new();
                for request in &blocked {
                    for dep in &request.depends_on {
                        if scheduled.contains(dep) {
                            continue;
                        }
                        if submitted.contains(dep.as_str()) {
                            if !cycle_members.contains(&request.name) {
                                cycle_members.push(request.name.clone());
                            }
                        } else {
                            warnings.push(ResolveWarning::MissingDependency {
                                operation: request.name.clone(),
                                missing: dep.clone(),
                            });
                        }
                    }
                }
                if !cycle_members.is_empty() {
                    warnings.push(ResolveWarning::Cycle {
                        members: cycle_members,
                    });
                }

                warn!(
                    forced = blocked.len(),
                    "unresolvable dependencies, forcing final batch"
                );

                for request in &blocked {
                    scheduled.insert(request.name.clone());
                }
                batches.push(blocked.into_iter().cloned().collect());
                break;
            }

            let mut wave: Vec<OperationRequest> = ready.into_iter().cloned().collect();
            // Stable: higher priority first, submission order preserved
            // among equals.
            wave.sort_by_key(|r| std::cmp::Reverse(r.priority));

            for request in &wave {
                scheduled.insert(request.name.clone());
            }
            batches.push(wave);
            remaining = blocked;
        }

        let parallelizable = batches
            .iter()
            .filter(|batch| batch.len() > 1)
            .map(Vec::len)
            .sum();

        let speedup_estimate = self.speedup(&batches);

        ResolvedPlan {
            meta: ResolveMeta {
                batch_count: batches.len(),
                parallelizable,
                speedup_estimate,
                warnings,
            },
            batches,
        }
    }

    /// Sequential-over-parallel duration ratio for the batch layout
    fn speedup(&self, batches: &[Vec<OperationRequest>]) -> f64 {
        let sequential: Duration = batches
            .iter()
            .flatten()
            .map(|r| self.estimates.estimate_for(&r.name))
            .sum();

        let parallel: Duration = batches
            .iter()
            .map(|batch| {
                batch
                    .iter()
                    .map(|r| self.estimates.estimate_for(&r.name))
                    .max()
                    .unwrap_or(Duration::ZERO)
            })
            .sum();

        if parallel.is_zero() {
            return 1.0;
        }
        sequential.as_secs_f64() / parallel.as_secs_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(batch: &[OperationRequest]) -> Vec<&str> {
        batch.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_empty_input_is_one_empty_batch() {
        let plan = DependencyResolver::new().resolve(&[]);
        assert_eq!(plan.batches, vec![Vec::new()]);
        assert_eq!(plan.meta.batch_count, 1);
        assert!(!plan.meta.has_warnings());
        assert_eq!(plan.meta.speedup_estimate, 1.0);
    }

    #[test]
    fn test_independent_requests_share_one_batch() {
        let requests = vec![
            OperationRequest::new("a"),
            OperationRequest::new("b"),
            OperationRequest::new("c"),
        ];
        let plan = DependencyResolver::new().resolve(&requests);

        assert_eq!(plan.meta.batch_count, 1);
        assert_eq!(names(&plan.batches[0]), vec!["a", "b", "c"]);
        assert_eq!(plan.meta.parallelizable, 3);
        assert!(plan.meta.speedup_estimate >= 1.0);
    }

    #[test]
    fn test_chain_produces_singleton_batches() {
        let requests = vec![
            OperationRequest::new("a"),
            OperationRequest::new("b").depends_on("a"),
            OperationRequest::new("c").depends_on("b"),
        ];
        let plan = DependencyResolver::new().resolve(&requests);

        assert_eq!(plan.meta.batch_count, 3);
        assert_eq!(names(&plan.batches[0]), vec!["a"]);
        assert_eq!(names(&plan.batches[1]), vec!["b"]);
        assert_eq!(names(&plan.batches[2]), vec!["c"]);
        assert!(plan.meta.speedup_estimate >= 1.0);
        assert!(!plan.meta.has_warnings());
    }

    #[test]
    fn test_every_request_after_its_dependencies() {
        let requests = vec![
            OperationRequest::new("d").depends_on("b").depends_on("c"),
            OperationRequest::new("b").depends_on("a"),
            OperationRequest::new("c").depends_on("a"),
            OperationRequest::new("a"),
        ];
        let plan = DependencyResolver::new().resolve(&requests);

        let batch_of = |name: &str| {
            plan.batches
                .iter()
                .position(|batch| batch.iter().any(|r| r.name == name))
                .unwrap()
        };

        for request in &requests {
            for dep in &request.depends_on {
                assert!(batch_of(&request.name) > batch_of(dep));
            }
        }

        // Every request appears exactly once.
        let total: usize = plan.batches.iter().map(Vec::len).sum();
        assert_eq!(total, requests.len());
    }

    #[test]
    fn test_cycle_forces_final_batch_with_warning() {
        let requests = vec![
            OperationRequest::new("a").depends_on("b"),
            OperationRequest::new("b").depends_on("a"),
        ];
        let plan = DependencyResolver::new().resolve(&requests);

        assert_eq!(plan.meta.batch_count, 1);
        assert_eq!(names(&plan.batches[0]), vec!["a", "b"]);
        assert!(plan
            .meta
            .warnings
            .iter()
            .any(|w| matches!(w, ResolveWarning::Cycle { members } if members.len() == 2)));
    }

    #[test]
    fn test_self_dependency_is_forced_with_warning() {
        let requests = vec![OperationRequest::new("a").depends_on("a")];
        let plan = DependencyResolver::new().resolve(&requests);

        assert_eq!(plan.meta.batch_count, 1);
        assert_eq!(names(&plan.batches[0]), vec!["a"]);
        assert!(plan.meta.has_warnings());
    }

    #[test]
    fn test_missing_dependency_warning() {
        let requests = vec![OperationRequest::new("a").depends_on("never_submitted")];
        let plan = DependencyResolver::new().resolve(&requests);

        assert_eq!(plan.meta.batch_count, 1);
        assert!(matches!(
            &plan.meta.warnings[0],
            ResolveWarning::MissingDependency { operation, missing }
                if operation == "a" && missing == "never_submitted"
        ));
    }

    #[test]
    fn test_duplicate_name_warning() {
        let requests = vec![
            OperationRequest::new("list_devices").with_param("site", "dc1"),
            OperationRequest::new("list_devices").with_param("site", "dc2"),
        ];
        let plan = DependencyResolver::new().resolve(&requests);

        // Both copies are still scheduled; the shadowing is flagged.
        let total: usize = plan.batches.iter().map(Vec::len).sum();
        assert_eq!(total, 2);
        assert!(plan.meta.warnings.iter().any(|w| matches!(
            w,
            ResolveWarning::DuplicateName { operation } if operation == "list_devices"
        )));
    }

    #[test]
    fn test_partial_schedule_before_forced_batch() {
        let requests = vec![
            OperationRequest::new("ok"),
            OperationRequest::new("x").depends_on("y"),
            OperationRequest::new("y").depends_on("x"),
        ];
        let plan = DependencyResolver::new().resolve(&requests);

        assert_eq!(plan.meta.batch_count, 2);
        assert_eq!(names(&plan.batches[0]), vec!["ok"]);
        assert_eq!(names(&plan.batches[1]), vec!["x", "y"]);
        assert!(plan.meta.has_warnings());
    }

    #[test]
    fn test_priority_orders_within_batch() {
        let requests = vec![
            OperationRequest::new("low").with_priority(1),
            OperationRequest::new("high").with_priority(9),
        ];
        let plan = DependencyResolver::new().resolve(&requests);
        assert_eq!(names(&plan.batches[0]), vec!["high", "low"]);
    }

    proptest::proptest! {
        #[test]
        fn prop_independent_requests_fill_one_batch(count in 1usize..32) {
            let requests: Vec<OperationRequest> = (0..count)
                .map(|n| OperationRequest::new(format!("op_{n}")))
                .collect();
            let plan = DependencyResolver::new().resolve(&requests);

            proptest::prop_assert_eq!(plan.meta.batch_count, 1);
            proptest::prop_assert_eq!(plan.batches[0].len(), count);
            proptest::prop_assert!(!plan.meta.has_warnings());
        }

        #[test]
        fn prop_linear_chain_preserves_every_request(count in 1usize..16) {
            let requests: Vec<OperationRequest> = (0..count)
                .map(|n| {
                    let request = OperationRequest::new(format!("op_{n}"));
                    if n == 0 {
                        request
                    } else {
                        request.depends_on(format!("op_{}", n - 1))
                    }
                })
                .collect();
            let plan = DependencyResolver::new().resolve(&requests);

            proptest::prop_assert_eq!(plan.meta.batch_count, count);
            let total: usize = plan.batches.iter().map(Vec::len).sum();
            proptest::prop_assert_eq!(total, count);
        }
    }

    #[test]
    fn test_speedup_reflects_parallelism() {
        let estimates = DurationEstimates::new().with_default(Duration::from_secs(1));
        let resolver = DependencyResolver::with_estimates(estimates);

        let requests = vec![
            OperationRequest::new("a"),
            OperationRequest::new("b"),
            OperationRequest::new("c"),
        ];
        let plan = resolver.resolve(&requests);

        // Three one-second operations in one batch: 3s sequential, 1s parallel.
        assert!((plan.meta.speedup_estimate - 3.0).abs() < f64::EPSILON);
    }
}
