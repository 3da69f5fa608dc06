//! Parallel and sequential operation execution.

use crate::context::ContextRules;
use crate::rate::RateLimiter;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use trellis_cache::CacheStore;
use trellis_core::{
    CoreError, CoreResult, Degradation, Invoker, OperationRequest, OperationResult, Params,
};
use trellis_limits::{
    collection_items, declared_total, fallback_payload, paginate, sample, sample_payload,
    FallbackGuidance, LimitationDetector,
};

/// Executor tuning
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum concurrently in-flight invocations
    pub max_concurrency: usize,
    /// First retry delay; doubles per subsequent attempt
    pub backoff_base: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 10,
            backoff_base: Duration::from_millis(200),
        }
    }
}

/// Runs operations against the invoker
///
/// Parallel batches run concurrently under a bounded semaphore; every
/// invocation, batch or chain, passes through the shared rate limiter.
/// Failures surface as failed results, never as panics or batch aborts.
pub struct Executor {
    invoker: Arc<dyn Invoker>,
    cache: Arc<CacheStore>,
    limiter: Arc<RateLimiter>,
    semaphore: Arc<Semaphore>,
    detector: LimitationDetector,
    context_rules: ContextRules,
    config: ExecutorConfig,
}

impl Executor {
    /// Create an executor
    #[must_use]
    pub fn new(
        invoker: Arc<dyn Invoker>,
        cache: Arc<CacheStore>,
        limiter: Arc<RateLimiter>,
        detector: LimitationDetector,
        context_rules: ContextRules,
        config: ExecutorConfig,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            invoker,
            cache,
            limiter,
            semaphore,
            detector,
            context_rules,
            config,
        }
    }

    /// Execute a batch of independent requests concurrently
    ///
    /// One request's failure never cancels its siblings; the output always
    /// holds exactly one result per request, in request order.
    pub async fn execute_batch(
        &self,
        requests: &[OperationRequest],
        strategy: Option<Degradation>,
    ) -> Vec<OperationResult> {
        let futures = requests
            .iter()
            .map(|request| self.dispatch(request, request.params.clone(), strategy));
        futures::future::join_all(futures).await
    }

    /// Execute a dependent sequence in order with context propagation
    ///
    /// Each step's dependencies contribute parameters extracted from prior
    /// results. A step is attempted even when a dependency failed, with
    /// whatever partial context exists; its result then names the missing
    /// pieces.
    pub async fn execute_chain(
        &self,
        requests: &[OperationRequest],
        prior: &mut IndexMap<String, OperationResult>,
        strategy: Option<Degradation>,
    ) -> Vec<OperationResult> {
        let mut results = Vec::with_capacity(requests.len());

        for request in requests {
            let (context, missing) = self.context_rules.extract(&request.depends_on, prior);
            if !missing.is_empty() {
                warn!(
                    operation = %request.name,
                    missing = ?missing,
                    "executing with partial dependency context"
                );
            }

            let mut params = request.params.clone();
            params.merge(context);

            let mut result = self.dispatch(request, params, strategy).await;
            if !result.succeeded && !missing.is_empty() {
                let detail = format!("missing dependency context: {}", missing.join(", "));
                result.error = Some(match result.error.take() {
                    Some(error) => format!("{} ({})", error, detail),
                    None => detail,
                });
            }

            prior.insert(request.name.clone(), result.clone());
            results.push(result);
        }

        results
    }

    /// Route one request either directly or through the round's strategy
    async fn dispatch(
        &self,
        request: &OperationRequest,
        params: Params,
        strategy: Option<Degradation>,
    ) -> OperationResult {
        if let Some(strategy) = strategy {
            let probe = OperationRequest {
                params: params.clone(),
                ..request.clone()
            };
            if !self.detector.classify(&probe).is_empty() {
                return self.execute_degraded(request, params, strategy).await;
            }
        }
        self.execute_direct(request, params).await
    }

    /// Cache-checked direct execution with retry
    async fn execute_direct(&self, request: &OperationRequest, params: Params) -> OperationResult {
        if let Some(value) = self.cache.get(&request.name, &params) {
            return OperationResult::cached(&request.name, params, value);
        }

        let start = tokio::time::Instant::now();
        let (outcome, attempts) = self
            .invoke_with_retry(&request.name, &params, request.retry_budget)
            .await;

        match outcome {
            Ok(value) => {
                self.cache
                    .set(&request.name, &params, value.clone(), request.cache_ttl_override);
                OperationResult::success(&request.name, params, value, start.elapsed(), attempts)
            }
            Err(err) => OperationResult::failure(
                &request.name,
                params,
                err.to_string(),
                start.elapsed(),
                attempts,
            ),
        }
    }

    /// Execute via the selected degradation strategy
    async fn execute_degraded(
        &self,
        request: &OperationRequest,
        params: Params,
        strategy: Degradation,
    ) -> OperationResult {
        match strategy {
            Degradation::Fallback => self.fallback_result(
                request,
                params,
                format!(
                    "operation {} is known to exceed safe result bounds",
                    request.name
                ),
            ),
            Degradation::ProgressiveDisclosure => {
                let Some(rule) = self.detector.rule_for(&request.name) else {
                    return self.fallback_result(
                        request,
                        params,
                        "risk classification unavailable".to_string(),
                    );
                };
                let page_size = rule.page_size;

                // The cursor lives outside the fetch identity: every replay
                // of any offset pages the same underlying (cached) fetch.
                let mut fetch_params = params.clone();
                let offset = fetch_params
                    .remove("offset")
                    .and_then(|value| value.as_u64())
                    .unwrap_or(0) as usize;

                let raw = self.execute_direct(request, fetch_params).await;
                if !raw.succeeded {
                    return OperationResult { params, ..raw };
                }

                let payload = raw.payload.clone().unwrap_or(Value::Null);
                let items: Vec<Value> = collection_items(&payload)
                    .cloned()
                    .unwrap_or_else(|| vec![payload.clone()]);
                let page = paginate(&items, offset, page_size, declared_total(&payload));

                OperationResult {
                    params,
                    payload: Some(page.to_payload()),
                    ..raw
                }
                .with_degradation(Degradation::ProgressiveDisclosure)
            }
            Degradation::Sampling => {
                let Some(rule) = self.detector.rule_for(&request.name) else {
                    return self.fallback_result(
                        request,
                        params,
                        "risk classification unavailable".to_string(),
                    );
                };
                let bounds = rule.sample_bounds;

                let raw = self.execute_direct(request, params).await;
                if !raw.succeeded {
                    return raw;
                }

                let payload = raw.payload.clone().unwrap_or(Value::Null);
                let items: Vec<Value> = collection_items(&payload)
                    .cloned()
                    .unwrap_or_else(|| vec![payload.clone()]);
                let sampled = sample(&items, bounds);

                OperationResult {
                    payload: Some(sample_payload(&sampled, items.len())),
                    ..raw
                }
                .with_degradation(Degradation::Sampling)
            }
        }
    }

    /// Structured guidance instead of a remote call
    fn fallback_result(
        &self,
        request: &OperationRequest,
        params: Params,
        reason: String,
    ) -> OperationResult {
        debug!(operation = %request.name, %reason, "answering with fallback guidance");
        let guidance = FallbackGuidance::new(reason);
        OperationResult::success(
            &request.name,
            params,
            fallback_payload(&guidance),
            Duration::ZERO,
            0,
        )
        .with_degradation(Degradation::Fallback)
    }

    /// Invoke with exponential backoff up to the request's budget
    ///
    /// The concurrency permit wraps only the in-flight call: it is
    /// re-acquired per attempt and released before the backoff sleep, so a
    /// request waiting out a backoff never occupies a slot a sibling in the
    /// same batch could use.
    async fn invoke_with_retry(
        &self,
        name: &str,
        params: &Params,
        budget: u32,
    ) -> (CoreResult<Value>, u32) {
        let budget = budget.max(1);
        let mut delay = self.config.backoff_base;
        let mut attempt = 0;

        loop {
            attempt += 1;

            let outcome = {
                let permit = match self.semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (
                            Err(CoreError::Internal {
                                message: "executor semaphore closed".to_string(),
                            }),
                            attempt - 1,
                        );
                    }
                };
                self.limiter.acquire().await;
                let outcome = self.invoker.invoke(name, params).await;
                drop(permit);
                outcome
            };

            match outcome {
                Ok(value) => return (Ok(value), attempt),
                Err(err) if attempt < budget => {
                    debug!(operation = name, attempt, %err, "invoke failed, backing off");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                Err(err) => {
                    warn!(operation = name, attempts = attempt, %err, "retry budget exhausted");
                    return (Err(err), attempt);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use trellis_limits::{LimitationKind, RiskRule, RiskTable};

    /// Scripted invoker: fails the named operation `fail_first` times, then
    /// answers from the script.
    struct FakeInvoker {
        script: IndexMap<String, Value>,
        fail_first: IndexMap<String, u32>,
        calls: AtomicU32,
    }

    impl FakeInvoker {
        fn new(script: IndexMap<String, Value>) -> Self {
            Self {
                script,
                fail_first: IndexMap::new(),
                calls: AtomicU32::new(0),
            }
        }

        fn failing(mut self, name: &str, times: u32) -> Self {
            self.fail_first.insert(name.to_string(), times);
            self
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Invoker for FakeInvoker {
        async fn invoke(&self, name: &str, _params: &Params) -> CoreResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(remaining) = self.fail_first.get(name) {
                // Note: IndexMap is behind &self here, so the failure
                // countdown uses the call counter instead of mutation.
                let so_far = self.calls.load(Ordering::SeqCst);
                if so_far <= *remaining {
                    return Err(CoreError::Invoke {
                        operation: name.to_string(),
                        message: "transient failure".to_string(),
                    });
                }
            }
            self.script
                .get(name)
                .cloned()
                .ok_or_else(|| CoreError::Invoke {
                    operation: name.to_string(),
                    message: "unknown operation".to_string(),
                })
        }
    }

    fn executor(invoker: Arc<dyn Invoker>, table: RiskTable) -> Executor {
        Executor::new(
            invoker,
            Arc::new(CacheStore::in_memory()),
            Arc::new(RateLimiter::new(100, Duration::from_secs(1))),
            LimitationDetector::new(table),
            ContextRules::new(),
            ExecutorConfig {
                max_concurrency: 10,
                backoff_base: Duration::from_millis(10),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_returns_one_result_per_request() {
        let mut script = IndexMap::new();
        for name in ["a", "b", "c", "d"] {
            script.insert(name.to_string(), json!(name));
        }
        let invoker = Arc::new(FakeInvoker::new(script));
        let exec = executor(invoker, RiskTable::new());

        let requests: Vec<OperationRequest> = ["a", "b", "c", "d", "boom"]
            .iter()
            .map(|name| OperationRequest::new(*name).with_retry_budget(1))
            .collect();

        let results = exec.execute_batch(&requests, None).await;
        assert_eq!(results.len(), 5);
        assert_eq!(results.iter().filter(|r| r.succeeded).count(), 4);
        let failed = results.iter().find(|r| !r.succeeded).unwrap();
        assert_eq!(failed.name, "boom");
        assert!(failed.error.as_deref().unwrap().contains("unknown operation"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_then_success_counts_attempts() {
        let mut script = IndexMap::new();
        script.insert("flaky".to_string(), json!("ok"));
        let invoker = Arc::new(FakeInvoker::new(script).failing("flaky", 2));
        let exec = executor(invoker.clone(), RiskTable::new());

        let request = OperationRequest::new("flaky").with_retry_budget(5);
        let results = exec.execute_batch(std::slice::from_ref(&request), None).await;

        assert!(results[0].succeeded);
        assert_eq!(results[0].attempts, 3);
        assert_eq!(invoker.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhaustion_is_terminal() {
        let invoker = Arc::new(FakeInvoker::new(IndexMap::new()));
        let exec = executor(invoker.clone(), RiskTable::new());

        let request = OperationRequest::new("nope").with_retry_budget(3);
        let results = exec.execute_batch(std::slice::from_ref(&request), None).await;

        assert!(!results[0].succeeded);
        assert_eq!(results[0].attempts, 3);
        assert_eq!(invoker.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_releases_concurrency_slot() {
        let mut script = IndexMap::new();
        script.insert("flaky".to_string(), json!("ok"));
        script.insert("quick".to_string(), json!("ok"));
        let invoker = Arc::new(FakeInvoker::new(script).failing("flaky", 1));

        let exec = Executor::new(
            invoker,
            Arc::new(CacheStore::in_memory()),
            Arc::new(RateLimiter::new(100, Duration::from_secs(1))),
            LimitationDetector::new(RiskTable::new()),
            ContextRules::new(),
            ExecutorConfig {
                max_concurrency: 1,
                backoff_base: Duration::from_secs(5),
            },
        );

        let requests = vec![
            OperationRequest::new("flaky").with_retry_budget(2),
            OperationRequest::new("quick"),
        ];
        let results = exec.execute_batch(&requests, None).await;

        assert!(results.iter().all(|r| r.succeeded));
        assert_eq!(results[0].attempts, 2);
        // The sibling must not wait out the flaky request's backoff sleep.
        assert!(results[1].elapsed < Duration::from_secs(5));
        // The flaky request itself does wait out its own backoff.
        assert!(results[0].elapsed >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_through_then_cache_hit() {
        let mut script = IndexMap::new();
        script.insert("list".to_string(), json!([1, 2]));
        let invoker = Arc::new(FakeInvoker::new(script));
        let exec = executor(invoker.clone(), RiskTable::new());

        let request = OperationRequest::new("list");
        let first = exec.execute_batch(std::slice::from_ref(&request), None).await;
        let second = exec.execute_batch(std::slice::from_ref(&request), None).await;

        assert!(!first[0].from_cache);
        assert!(second[0].from_cache);
        assert_eq!(second[0].payload, Some(json!([1, 2])));
        assert_eq!(invoker.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_injects_context() {
        let mut script = IndexMap::new();
        script.insert("find".to_string(), json!({"id": 7}));
        script.insert("detail".to_string(), json!("detail"));
        let invoker = Arc::new(FakeInvoker::new(script));

        let exec = Executor::new(
            invoker,
            Arc::new(CacheStore::in_memory()),
            Arc::new(RateLimiter::new(100, Duration::from_secs(1))),
            LimitationDetector::new(RiskTable::new()),
            ContextRules::new().with_rule("find", crate::context::ContextRule::new("/id", "device_id")),
            ExecutorConfig::default(),
        );

        let chain = vec![OperationRequest::new("detail").depends_on("find")];
        let mut prior = IndexMap::new();
        prior.insert(
            "find".to_string(),
            OperationResult::success("find", Params::new(), json!({"id": 7}), Duration::ZERO, 1),
        );

        let results = exec.execute_chain(&chain, &mut prior, None).await;
        assert!(results[0].succeeded);
        assert_eq!(results[0].params.get("device_id"), Some(&json!(7)));
        assert!(prior.contains_key("detail"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_continues_past_failed_dependency() {
        let mut script = IndexMap::new();
        script.insert("later".to_string(), json!("ran"));
        let invoker = Arc::new(FakeInvoker::new(script));
        let exec = executor(invoker, RiskTable::new());

        let chain = vec![
            OperationRequest::new("broken").with_retry_budget(1),
            OperationRequest::new("later").depends_on("broken"),
        ];
        let mut prior = IndexMap::new();

        let results = exec.execute_chain(&chain, &mut prior, None).await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].succeeded);
        // Later step still attempted with partial context.
        assert!(results[1].succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progressive_disclosure_bounds_page() {
        let items: Vec<i64> = (0..100).collect();
        let mut script = IndexMap::new();
        script.insert("list_big".to_string(), json!(items));
        let invoker = Arc::new(FakeInvoker::new(script));

        let table = RiskTable::new().with_rule(
            "list_big",
            RiskRule::new(vec![LimitationKind::UnboundedResult]).with_page_size(25),
        );
        let exec = executor(invoker, table);

        let request = OperationRequest::new("list_big");
        let results = exec
            .execute_batch(
                std::slice::from_ref(&request),
                Some(Degradation::ProgressiveDisclosure),
            )
            .await;

        let payload = results[0].payload.as_ref().unwrap();
        assert_eq!(results[0].degraded, Some(Degradation::ProgressiveDisclosure));
        assert_eq!(payload["items"].as_array().unwrap().len(), 25);
        assert_eq!(payload["next_cursor"], json!(25));
        assert_eq!(payload["total_estimate"], json!(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progressive_cursor_replay_identical() {
        let items: Vec<i64> = (0..60).collect();
        let mut script = IndexMap::new();
        script.insert("list_big".to_string(), json!(items));
        let invoker = Arc::new(FakeInvoker::new(script));

        let table = RiskTable::new().with_rule(
            "list_big",
            RiskRule::new(vec![LimitationKind::UnboundedResult]).with_page_size(25),
        );
        let exec = executor(invoker.clone(), table);

        let request = OperationRequest::new("list_big").with_param("offset", 25);
        let strategy = Some(Degradation::ProgressiveDisclosure);
        let first = exec.execute_batch(std::slice::from_ref(&request), strategy).await;
        let second = exec.execute_batch(std::slice::from_ref(&request), strategy).await;

        assert_eq!(first[0].payload, second[0].payload);
        // Replay pages the cached fetch instead of re-invoking.
        assert_eq!(invoker.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sampling_is_deterministic() {
        let items: Vec<i64> = (0..100).collect();
        let mut script = IndexMap::new();
        script.insert("neighbors".to_string(), json!(items));
        let invoker = Arc::new(FakeInvoker::new(script));

        let table = RiskTable::new().with_rule(
            "neighbors",
            RiskRule::new(vec![LimitationKind::FanOutRelationship])
                .with_fan_out_param("ids", 2),
        );
        let exec = executor(invoker, table);

        let request = OperationRequest::new("neighbors").with_param("ids", vec![1, 2, 3]);
        let strategy = Some(Degradation::Sampling);
        let first = exec.execute_batch(std::slice::from_ref(&request), strategy).await;
        let second = exec.execute_batch(std::slice::from_ref(&request), strategy).await;

        assert_eq!(first[0].degraded, Some(Degradation::Sampling));
        assert_eq!(first[0].payload, second[0].payload);
        let payload = first[0].payload.as_ref().unwrap();
        assert_eq!(payload["sample_size"], json!(10));
        assert_eq!(payload["total"], json!(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_never_invokes() {
        let invoker = Arc::new(FakeInvoker::new(IndexMap::new()));
        let table = RiskTable::new().with_rule(
            "audit",
            RiskRule::new(vec![LimitationKind::UnboundedResult]).with_forced_fallback(),
        );
        let exec = executor(invoker.clone(), table);

        let request = OperationRequest::new("audit");
        let results = exec
            .execute_batch(std::slice::from_ref(&request), Some(Degradation::Fallback))
            .await;

        assert!(results[0].succeeded);
        assert_eq!(results[0].degraded, Some(Degradation::Fallback));
        assert_eq!(results[0].payload.as_ref().unwrap()["degraded"], json!("fallback"));
        assert_eq!(invoker.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unflagged_request_runs_direct_despite_strategy() {
        let mut script = IndexMap::new();
        script.insert("get_one".to_string(), json!({"id": 1}));
        let invoker = Arc::new(FakeInvoker::new(script));
        let exec = executor(invoker, RiskTable::new());

        let request = OperationRequest::new("get_one");
        let results = exec
            .execute_batch(
                std::slice::from_ref(&request),
                Some(Degradation::ProgressiveDisclosure),
            )
            .await;

        assert!(results[0].succeeded);
        assert!(results[0].degraded.is_none());
        assert_eq!(results[0].payload, Some(json!({"id": 1})));
    }
}
