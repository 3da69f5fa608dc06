//! Coordination facade.
//!
//! One entry point per round: classify the planned requests, resolve them
//! into batches, execute each batch (parallel when independent, chained
//! when dependent), apply write invalidations, and record telemetry.

use crate::context::ContextRules;
use crate::executor::{Executor, ExecutorConfig};
use crate::monitor::{RoundMonitor, RoundSummary};
use crate::rate::RateLimiter;
use crate::stats::{CoordinationStats, RoundTally, StatsHandle};
use chrono::Utc;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use trellis_cache::{CacheStats, CacheStore, MemoryBackend, TtlPolicy};
use trellis_core::{Invoker, OperationRequest, OperationResult, Params};
use trellis_limits::{LimitationDetector, RiskTable};
use trellis_plan::{DependencyResolver, DurationEstimates};

/// Everything a coordinator needs beyond the invoker
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Maximum concurrently in-flight invocations
    pub max_concurrency: usize,
    /// Invocations permitted per rate window
    pub rate: u32,
    /// Rate window length
    pub rate_period: Duration,
    /// First retry delay; doubles per subsequent attempt
    pub backoff_base: Duration,
    /// Round summaries kept in memory
    pub history_limit: usize,
    /// Believed per-operation durations for speedup estimates
    pub estimates: DurationEstimates,
    /// Static risk profiles per operation name
    pub risk_table: RiskTable,
    /// How prior results parameterize dependent steps
    pub context_rules: ContextRules,
    /// Cache lifetimes per operation name
    pub ttl_policy: TtlPolicy,
    /// Canonical parameters for cache warming, per operation name
    pub hot_params: HashMap<String, Params>,
    /// Cache-key glob to invalidate after each named mutating operation
    pub mutating_evictions: HashMap<String, String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            rate: 10,
            rate_period: Duration::from_secs(1),
            backoff_base: Duration::from_millis(200),
            history_limit: 32,
            estimates: DurationEstimates::default(),
            risk_table: RiskTable::new(),
            context_rules: ContextRules::new(),
            ttl_policy: TtlPolicy::default(),
            hot_params: HashMap::new(),
            mutating_evictions: HashMap::new(),
        }
    }
}

impl CoordinatorConfig {
    /// Create a config with standard limits
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the concurrency bound
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Set the rate limit
    #[must_use]
    pub fn with_rate(mut self, rate: u32, period: Duration) -> Self {
        self.rate = rate;
        self.rate_period = period;
        self
    }

    /// Set the initial retry backoff
    #[must_use]
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set the duration estimate table
    #[must_use]
    pub fn with_estimates(mut self, estimates: DurationEstimates) -> Self {
        self.estimates = estimates;
        self
    }

    /// Set the risk table
    #[must_use]
    pub fn with_risk_table(mut self, table: RiskTable) -> Self {
        self.risk_table = table;
        self
    }

    /// Set the context extraction rules
    #[must_use]
    pub fn with_context_rules(mut self, rules: ContextRules) -> Self {
        self.context_rules = rules;
        self
    }

    /// Set the cache TTL policy
    #[must_use]
    pub fn with_ttl_policy(mut self, policy: TtlPolicy) -> Self {
        self.ttl_policy = policy;
        self
    }

    /// Register canonical warm-up parameters for an operation
    #[must_use]
    pub fn with_hot_params(mut self, name: impl Into<String>, params: Params) -> Self {
        self.hot_params.insert(name.into(), params);
        self
    }

    /// Invalidate cache keys matching `pattern` after each successful run
    /// of the named mutating operation
    #[must_use]
    pub fn with_mutating_eviction(
        mut self,
        name: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        self.mutating_evictions.insert(name.into(), pattern.into());
        self
    }
}

/// Single entry point for tool coordination
///
/// Owns the resolver, detector, executor, cache, and telemetry; callers
/// submit a round of requests and get back one result per request.
pub struct Coordinator {
    resolver: DependencyResolver,
    detector: LimitationDetector,
    executor: Executor,
    cache: Arc<CacheStore>,
    stats: StatsHandle,
    monitor: RoundMonitor,
    hot_params: HashMap<String, Params>,
    mutating_evictions: HashMap<String, String>,
}

impl Coordinator {
    /// Create a coordinator over the given invoker with an in-memory cache
    #[must_use]
    pub fn new(invoker: Arc<dyn Invoker>, config: CoordinatorConfig) -> Self {
        let cache = Arc::new(CacheStore::new(
            Arc::new(MemoryBackend::new()),
            config.ttl_policy.clone(),
        ));
        Self::with_cache_store(invoker, config, cache)
    }

    /// Create a coordinator over a caller-supplied cache store
    #[must_use]
    pub fn with_cache_store(
        invoker: Arc<dyn Invoker>,
        config: CoordinatorConfig,
        cache: Arc<CacheStore>,
    ) -> Self {
        let detector = LimitationDetector::new(config.risk_table.clone());
        let limiter = Arc::new(RateLimiter::new(config.rate, config.rate_period));
        let executor = Executor::new(
            invoker,
            cache.clone(),
            limiter,
            detector.clone(),
            config.context_rules.clone(),
            ExecutorConfig {
                max_concurrency: config.max_concurrency,
                backoff_base: config.backoff_base,
            },
        );

        Self {
            resolver: DependencyResolver::with_estimates(config.estimates),
            detector,
            executor,
            cache,
            stats: StatsHandle::new(),
            monitor: RoundMonitor::new(config.history_limit),
            hot_params: config.hot_params,
            mutating_evictions: config.mutating_evictions,
        }
    }

    /// Run one coordination round
    ///
    /// Returns exactly one result per request, in submission order. A
    /// request failure, a cycle, or a dangling dependency degrades its own
    /// result; it never aborts the round.
    pub async fn coordinate(&self, requests: &[OperationRequest]) -> Vec<OperationResult> {
        let round_start = tokio::time::Instant::now();
        let started_at = Utc::now();

        let (selection, records) = self.detector.select(requests);
        if let Some(selection) = &selection {
            info!(
                strategy = ?selection.strategy,
                driver = %selection.operation,
                matches = records.len(),
                "applying degradation strategy to flagged requests"
            );
        }
        let strategy = selection.as_ref().map(|s| s.strategy);

        let plan = self.resolver.resolve(requests);
        for warning in &plan.meta.warnings {
            warn!(?warning, "dependency resolution warning");
        }

        let mut prior: IndexMap<String, OperationResult> = IndexMap::new();
        let mut parallel_batches = 0u64;

        for batch in &plan.batches {
            if batch.is_empty() {
                continue;
            }
            if batch.iter().all(OperationRequest::is_independent) {
                if batch.len() > 1 {
                    parallel_batches += 1;
                }
                for result in self.executor.execute_batch(batch, strategy).await {
                    prior.insert(result.name.clone(), result);
                }
            } else {
                self.executor.execute_chain(batch, &mut prior, strategy).await;
            }
        }

        for (name, result) in &prior {
            if result.succeeded && !result.from_cache {
                if let Some(pattern) = self.mutating_evictions.get(name) {
                    self.cache.invalidate_pattern(pattern);
                }
            }
        }

        let results: Vec<OperationResult> = requests
            .iter()
            .map(|request| match prior.get(&request.name) {
                Some(result) => result.clone(),
                None => OperationResult::failure(
                    &request.name,
                    request.params.clone(),
                    "no result produced",
                    Duration::ZERO,
                    0,
                ),
            })
            .collect();

        let succeeded = results.iter().filter(|r| r.succeeded).count();
        let cache_hits = results.iter().filter(|r| r.from_cache).count();
        let degraded = results.iter().filter(|r| r.is_degraded()).count();

        self.stats.record_round(RoundTally {
            requests: results.len() as u64,
            succeeded: succeeded as u64,
            cache_hits: cache_hits as u64,
            parallel_batches,
        });
        self.monitor.record(RoundSummary {
            started_at,
            request_count: results.len(),
            batch_count: plan.meta.batch_count,
            succeeded,
            failed: results.len() - succeeded,
            cache_hits,
            degraded,
            warnings: plan.meta.warnings.clone(),
            elapsed: round_start.elapsed(),
        });

        results
    }

    /// Pre-populate the cache for the named operations
    ///
    /// Each name runs with its registered canonical parameters (empty when
    /// none are registered). Returns the number that succeeded.
    pub async fn warm(&self, names: &[String]) -> usize {
        let requests: Vec<OperationRequest> = names
            .iter()
            .map(|name| {
                let params = self.hot_params.get(name).cloned().unwrap_or_default();
                OperationRequest::new(name.clone()).with_params(params)
            })
            .collect();

        let results = self.coordinate(&requests).await;
        results.iter().filter(|r| r.succeeded).count()
    }

    /// Snapshot of the cumulative coordination statistics
    #[must_use]
    pub fn stats(&self) -> CoordinationStats {
        self.stats.snapshot()
    }

    /// Snapshot of the cache hit/miss statistics
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// The `n` most recent round summaries, newest last
    #[must_use]
    pub fn recent_rounds(&self, n: usize) -> Vec<RoundSummary> {
        self.monitor.recent(n)
    }

    /// Shared handle to the cache store
    #[must_use]
    pub fn cache(&self) -> Arc<CacheStore> {
        self.cache.clone()
    }
}
