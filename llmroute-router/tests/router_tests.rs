//! Routing scenarios against scripted adapters.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use llmroute_core::{
    AdapterError, CandidateFailure, CandidateKey, CompletionRequest, CompletionResponse,
    ManualClock, ModelConfig, ProviderAdapter, ProviderConfig, ProviderKind, ProviderRegistry,
    ConfigError, QuotaWindow, RouteRequest, RouterError,
};
use llmroute_router::{BuildError, Router, RouterBuilder};
use llmroute_store::{CircuitBreakerConfig, CounterStore, FileCounterStore, MemoryCounterStore};
use tempfile::TempDir;

// ============================================================================
// Scripted adapter
// ============================================================================

#[derive(Debug, Clone)]
enum Step {
    Reply(&'static str),
    Fail(AdapterError),
    Slow(Duration, &'static str),
}

struct ScriptedAdapter {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    configured: bool,
}

impl ScriptedAdapter {
    fn replying(text: &'static str) -> Arc<Self> {
        Self::scripted(Vec::new(), Step::Reply(text))
    }

    fn failing(error: AdapterError) -> Arc<Self> {
        Self::scripted(Vec::new(), Step::Fail(error))
    }

    fn scripted(steps: Vec<Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(steps.into()),
            fallback,
            configured: true,
        })
    }

    fn unconfigured() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            script: Mutex::new(VecDeque::new()),
            fallback: Step::Reply("never"),
            configured: false,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn invoke(
        &self,
        _model: &str,
        _request: &CompletionRequest,
        _timeout: Duration,
    ) -> Result<CompletionResponse, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match step {
            Step::Reply(text) => Ok(CompletionResponse::text(text)),
            Step::Fail(error) => Err(error),
            Step::Slow(delay, text) => {
                tokio::time::sleep(delay).await;
                Ok(CompletionResponse::text(text))
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 5).unwrap(),
    ))
}

fn provider(name: &str, model: ModelConfig) -> ProviderConfig {
    ProviderConfig::new(name, ProviderKind::OpenAi).with_model(model)
}

fn registry(providers: Vec<ProviderConfig>) -> ProviderRegistry {
    ProviderRegistry::new(providers).unwrap()
}

fn key(provider: &str, model: &str) -> CandidateKey {
    CandidateKey::new(provider, model)
}

fn request() -> RouteRequest {
    RouteRequest::new(CompletionRequest::new("ping"))
}

fn two_candidates(a: ModelConfig, b: ModelConfig) -> ProviderRegistry {
    registry(vec![provider("a", a), provider("b", b)])
}

fn build(
    registry: ProviderRegistry,
    adapters: &[(&str, Arc<ScriptedAdapter>)],
    clock: Arc<ManualClock>,
) -> Router {
    let mut builder = RouterBuilder::new(registry).clock(clock);
    for (name, adapter) in adapters {
        builder = builder.adapter(*name, adapter.clone());
    }
    builder.build().unwrap()
}

// ============================================================================
// Routing order and quotas
// ============================================================================

#[tokio::test]
async fn test_exhausted_quota_falls_through_to_next_candidate() {
    let (a, b) = (ScriptedAdapter::replying("from a"), ScriptedAdapter::replying("from b"));
    let router = build(
        two_candidates(ModelConfig::new("m1", 1, 100), ModelConfig::new("m2", 5, 100)),
        &[("a", a.clone()), ("b", b.clone())],
        clock(),
    );

    let first = router.submit(request()).await.unwrap();
    assert_eq!(first.served_by, key("a", "m1"));
    assert_eq!(first.response.text, "from a");
    assert!(first.skipped.is_empty());

    let second = router.submit(request()).await.unwrap();
    assert_eq!(second.served_by, key("b", "m2"));
    assert_eq!(second.skipped.len(), 1);
    assert!(matches!(
        second.skipped[0].reason,
        CandidateFailure::RateLimited {
            window: QuotaWindow::Minute,
            retry_after,
        } if retry_after == Duration::from_secs(55)
    ));
    assert_eq!(a.calls(), 1);
}

#[tokio::test]
async fn test_minute_rollover_restores_first_candidate() {
    let clock = clock();
    let (a, b) = (ScriptedAdapter::replying("a"), ScriptedAdapter::replying("b"));
    let router = build(
        two_candidates(ModelConfig::new("m1", 1, 100), ModelConfig::new("m2", 5, 100)),
        &[("a", a), ("b", b)],
        clock.clone(),
    );

    router.submit(request()).await.unwrap();
    assert_eq!(router.submit(request()).await.unwrap().served_by.provider, "b");

    clock.advance(Duration::from_secs(55));
    assert_eq!(router.submit(request()).await.unwrap().served_by.provider, "a");
}

#[tokio::test]
async fn test_override_does_not_change_global_order() {
    let (a, b) = (ScriptedAdapter::replying("a"), ScriptedAdapter::replying("b"));
    let router = build(
        two_candidates(ModelConfig::new("m1", 10, 100), ModelConfig::new("m2", 10, 100)),
        &[("a", a), ("b", b)],
        clock(),
    );

    let preferred = router
        .submit(request().with_override(vec![key("b", "m2"), key("a", "m1")]))
        .await
        .unwrap();
    assert_eq!(preferred.served_by, key("b", "m2"));

    let default = router.submit(request()).await.unwrap();
    assert_eq!(default.served_by, key("a", "m1"));
    assert_eq!(router.candidates()[0].key, key("a", "m1"));
}

#[tokio::test]
async fn test_unregistered_override_entry_is_reported() {
    let a = ScriptedAdapter::replying("a");
    let router = build(
        registry(vec![provider("a", ModelConfig::new("m1", 10, 100))]),
        &[("a", a)],
        clock(),
    );

    let result = router
        .submit(request().with_override(vec![key("ghost", "m"), key("a", "m1")]))
        .await
        .unwrap();
    assert_eq!(result.served_by, key("a", "m1"));
    assert_eq!(result.skipped.len(), 1);
    assert_eq!(result.skipped[0].key, key("ghost", "m"));
    assert_eq!(result.skipped[0].reason, CandidateFailure::Unregistered);
}

#[tokio::test]
async fn test_all_exhausted_lists_one_reason_per_candidate() {
    let a = ScriptedAdapter::failing(AdapterError::server(500, "boom"));
    let b = ScriptedAdapter::replying("b");
    let router = build(
        two_candidates(ModelConfig::new("m1", 10, 100), ModelConfig::new("m2", 3, 100)),
        &[("a", a.clone()), ("b", b.clone())],
        clock(),
    );

    for _ in 0..3 {
        let result = router.submit(request()).await.unwrap();
        assert_eq!(result.served_by.provider, "b");
        assert_eq!(result.skipped[0].reason.code(), "server_error");
    }

    let err = router.submit(request()).await.unwrap_err();
    let RouterError::AllProvidersExhausted { attempts } = &err else {
        panic!("expected exhaustion, got {err:?}");
    };
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0].key, key("a", "m1"));
    assert_eq!(attempts[0].reason.code(), "circuit_open");
    assert_eq!(attempts[1].key, key("b", "m2"));
    assert_eq!(attempts[1].reason.code(), "rate_limited");
    assert_eq!(err.earliest_retry(), Some(Duration::from_secs(55)));
    assert_eq!(a.calls(), 3);
    assert_eq!(b.calls(), 3);
}

#[tokio::test]
async fn test_no_candidates_is_exhausted() {
    let router = build(registry(Vec::new()), &[], clock());
    let err = router.submit(request()).await.unwrap_err();
    assert_eq!(err, RouterError::AllProvidersExhausted { attempts: Vec::new() });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submits_respect_quota() {
    let (a, b) = (ScriptedAdapter::replying("a"), ScriptedAdapter::replying("b"));
    let router = Arc::new(build(
        two_candidates(ModelConfig::new("m1", 3, 100), ModelConfig::new("m2", 100, 1000)),
        &[("a", a.clone()), ("b", b.clone())],
        clock(),
    ));

    let handles: Vec<_> = (0..40)
        .map(|_| {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.submit(request()).await })
        })
        .collect();

    let mut served_by_a = 0;
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        if result.served_by.provider == "a" {
            served_by_a += 1;
        }
    }

    assert_eq!(served_by_a, 3);
    assert_eq!((a.calls(), b.calls()), (3, 37));
    assert_eq!(router.quota_snapshot()[0].usage.requests_this_minute, 3);
}

// ============================================================================
// Circuit breaking
// ============================================================================

#[tokio::test]
async fn test_breaker_opens_then_admits_one_trial() {
    let clock = clock();
    let a = ScriptedAdapter::scripted(
        vec![
            Step::Fail(AdapterError::server(502, "bad gateway")),
            Step::Fail(AdapterError::Timeout(Duration::from_secs(30))),
            Step::Fail(AdapterError::AuthError("revoked".into())),
            Step::Slow(Duration::from_millis(150), "a recovered"),
        ],
        Step::Reply("a"),
    );
    let b = ScriptedAdapter::replying("b");
    let router = build(
        two_candidates(ModelConfig::new("m1", 100, 1000), ModelConfig::new("m2", 100, 1000)),
        &[("a", a.clone()), ("b", b)],
        clock.clone(),
    );

    for _ in 0..3 {
        assert_eq!(router.submit(request()).await.unwrap().served_by.provider, "b");
    }

    let skipped = router.submit(request()).await.unwrap();
    assert_eq!(skipped.served_by.provider, "b");
    assert!(matches!(
        skipped.skipped[0].reason,
        CandidateFailure::CircuitOpen { retry_after } if retry_after == Duration::from_secs(60)
    ));
    assert_eq!(a.calls(), 3);

    clock.advance(Duration::from_secs(60));
    let (trial, concurrent) = tokio::join!(router.submit(request()), router.submit(request()));

    let trial = trial.unwrap();
    assert_eq!(trial.served_by.provider, "a");
    assert_eq!(trial.response.text, "a recovered");

    let concurrent = concurrent.unwrap();
    assert_eq!(concurrent.served_by.provider, "b");
    assert_eq!(concurrent.skipped[0].reason.code(), "circuit_open");
    assert_eq!(a.calls(), 4);

    let states = router.circuit_states();
    assert_eq!(states[0].key, key("a", "m1"));
    assert_eq!(states[0].state.label(), "closed");
    assert_eq!(states[0].consecutive_failures, 0);
}

#[tokio::test]
async fn test_provider_rate_limit_leaves_breaker_closed() {
    let a = ScriptedAdapter::failing(AdapterError::rate_limited(
        Some(Duration::from_secs(20)),
        "slow down",
    ));
    let b = ScriptedAdapter::replying("b");
    let router = build(
        two_candidates(ModelConfig::new("m1", 100, 1000), ModelConfig::new("m2", 100, 1000)),
        &[("a", a.clone()), ("b", b)],
        clock(),
    );

    for _ in 0..5 {
        let result = router.submit(request()).await.unwrap();
        assert_eq!(result.skipped[0].reason.code(), "rate_limited");
        assert_eq!(result.skipped[0].reason.retry_after(), Some(Duration::from_secs(20)));
    }

    assert_eq!(a.calls(), 5);
    let states = router.circuit_states();
    assert_eq!(states[0].state.label(), "closed");
    assert_eq!(states[0].consecutive_failures, 0);
}

#[tokio::test]
async fn test_denied_reservation_releases_trial_slot() {
    let clock = clock();
    let a = ScriptedAdapter::failing(AdapterError::server(500, "down"));
    let b = ScriptedAdapter::replying("b");
    let router = build(
        two_candidates(ModelConfig::new("m1", 100, 3), ModelConfig::new("m2", 100, 1000)),
        &[("a", a.clone()), ("b", b)],
        clock.clone(),
    );

    for _ in 0..3 {
        router.submit(request()).await.unwrap();
    }
    clock.advance(Duration::from_secs(60));

    // The trial slot is taken, then the day quota refuses the call.
    let result = router.submit(request()).await.unwrap();
    assert!(matches!(
        result.skipped[0].reason,
        CandidateFailure::RateLimited {
            window: QuotaWindow::Day,
            ..
        }
    ));
    assert_eq!(router.circuit_states()[0].state.label(), "half_open");

    // Still half-open with a free slot: the next caller probes again.
    let result = router.submit(request()).await.unwrap();
    assert_eq!(result.skipped[0].reason.code(), "rate_limited");
    assert_eq!(a.calls(), 3);
}

// ============================================================================
// Failures and timeouts
// ============================================================================

#[tokio::test]
async fn test_persistence_failure_skips_without_calling() {
    let store = Arc::new(MemoryCounterStore::new());
    let a = ScriptedAdapter::replying("a");
    let router = RouterBuilder::new(registry(vec![provider("a", ModelConfig::new("m1", 10, 100))]))
        .adapter("a", a.clone())
        .store(store.clone())
        .clock(clock())
        .build()
        .unwrap();

    store.set_fail_writes(true);
    let err = router.submit(request()).await.unwrap_err();
    assert_eq!(err.attempts()[0].reason.code(), "persistence");
    assert_eq!(a.calls(), 0);
    assert_eq!(router.quota_snapshot()[0].usage.requests_this_minute, 0);

    store.set_fail_writes(false);
    assert_eq!(router.submit(request()).await.unwrap().served_by.provider, "a");
    assert_eq!(router.quota_snapshot()[0].usage.requests_this_minute, 1);
}

#[tokio::test]
async fn test_model_timeout_moves_on() {
    let a = ScriptedAdapter::scripted(Vec::new(), Step::Slow(Duration::from_secs(5), "late"));
    let b = ScriptedAdapter::replying("b");
    let router = build(
        two_candidates(
            ModelConfig::new("m1", 10, 100).with_timeout(Duration::from_secs(1)),
            ModelConfig::new("m2", 10, 100),
        ),
        &[("a", a), ("b", b)],
        clock(),
    );

    let result = router.submit(request()).await.unwrap();
    assert_eq!(result.served_by.provider, "b");
    assert_eq!(
        result.skipped[0].reason,
        CandidateFailure::Adapter(AdapterError::Timeout(Duration::from_secs(1)))
    );
    assert!(result.skipped[0].elapsed >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_deadline_aborts_remaining_candidates() {
    let a = ScriptedAdapter::scripted(Vec::new(), Step::Slow(Duration::from_secs(5), "late"));
    let b = ScriptedAdapter::replying("b");
    let c = ScriptedAdapter::replying("c");
    let router = build(
        registry(vec![
            provider("a", ModelConfig::new("m1", 10, 100)),
            provider("b", ModelConfig::new("m2", 10, 100)),
            provider("c", ModelConfig::new("m3", 10, 100)),
        ]),
        &[("a", a.clone()), ("b", b.clone()), ("c", c.clone())],
        clock(),
    );

    let deadline = Duration::from_millis(100);
    let err = router
        .submit(request().with_deadline(deadline))
        .await
        .unwrap_err();

    let RouterError::DeadlineExceeded {
        deadline: reported,
        attempts,
    } = &err
    else {
        panic!("expected deadline, got {err:?}");
    };
    assert_eq!(*reported, deadline);
    assert_eq!(attempts.len(), 3);
    assert!(attempts.iter().all(|a| a.reason == CandidateFailure::DeadlineExceeded));
    assert!(attempts[0].elapsed >= Duration::from_millis(90));
    assert_eq!((a.calls(), b.calls(), c.calls()), (1, 0, 0));

    // A late outcome is not counted against the breaker.
    assert_eq!(router.circuit_states()[0].consecutive_failures, 0);
    assert!(router.usage_snapshot().is_empty());
}

// ============================================================================
// Construction and views
// ============================================================================

#[tokio::test]
async fn test_unconfigured_provider_is_disabled() {
    let router = build(
        two_candidates(ModelConfig::new("m1", 10, 100), ModelConfig::new("m2", 10, 100)),
        &[("a", ScriptedAdapter::unconfigured()), ("b", ScriptedAdapter::replying("b"))],
        clock(),
    );
    assert_eq!(router.candidates().len(), 1);
    assert_eq!(router.candidates()[0].key, key("b", "m2"));

    let err = router
        .submit(request().with_override(vec![key("a", "m1")]))
        .await
        .unwrap_err();
    assert_eq!(err.attempts()[0].reason, CandidateFailure::Unregistered);
}

#[test]
fn test_builder_rejects_invalid_breaker_thresholds() {
    let invalid = [
        (0, 60, 900),
        (3, 600, 60),
        (3, 1_000_000_000_000_000, 1_000_000_000_000_000),
    ];
    for (failure_threshold, base, max) in invalid {
        let result = RouterBuilder::new(registry(vec![provider("a", ModelConfig::new("m1", 10, 100))]))
            .adapter("a", ScriptedAdapter::replying("a"))
            .circuit_breaker(CircuitBreakerConfig {
                failure_threshold,
                base_cooldown_secs: base,
                max_cooldown_secs: max,
            })
            .build();
        assert!(matches!(
            result,
            Err(BuildError::Config(ConfigError::InvalidBreaker(_)))
        ));
    }
}

#[tokio::test]
async fn test_provider_without_adapter_is_disabled() {
    let router = build(
        two_candidates(ModelConfig::new("m1", 10, 100), ModelConfig::new("m2", 10, 100)),
        &[("b", ScriptedAdapter::replying("b"))],
        clock(),
    );
    assert_eq!(router.candidates().len(), 1);
    assert!(router.adapter("a").is_none());
}

#[tokio::test]
async fn test_usage_snapshot_counts_calls() {
    let a = ScriptedAdapter::scripted(
        vec![Step::Fail(AdapterError::InvalidResponse("empty response".into()))],
        Step::Reply("a"),
    );
    let b = ScriptedAdapter::replying("b");
    let router = build(
        two_candidates(ModelConfig::new("m1", 10, 100), ModelConfig::new("m2", 10, 100)),
        &[("a", a), ("b", b)],
        clock(),
    );
    let mut updates = router.recorder().subscribe();

    let first = router.submit(request()).await.unwrap();
    assert_eq!(first.skipped[0].reason.code(), "invalid_response");
    router.submit(request()).await.unwrap();

    updates.changed().await.unwrap();
    assert_eq!(router.recorder().version(), 3);

    let stats = router.usage_snapshot();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].key, key("a", "m1"));
    assert_eq!((stats[0].requests, stats[0].successes, stats[0].failures), (2, 1, 1));
    assert!((stats[0].success_rate - 0.5).abs() < f64::EPSILON);
    assert_eq!(stats[0].failures_by_kind["invalid_response"], 1);
    assert_eq!(stats[1].requests, 1);
}

#[tokio::test]
async fn test_rate_limiting_can_be_disabled() {
    let a = ScriptedAdapter::replying("a");
    let store = Arc::new(MemoryCounterStore::new());
    let router = RouterBuilder::new(registry(vec![provider("a", ModelConfig::new("m1", 1, 1))]))
        .adapter("a", a.clone())
        .store(store.clone())
        .rate_limiting(false)
        .clock(clock())
        .build()
        .unwrap();

    for _ in 0..5 {
        router.submit(request()).await.unwrap();
    }
    assert_eq!(a.calls(), 5);
    assert_eq!(store.write_count(), 0);
    assert!(!router.rate_limiting_enabled());
}

#[tokio::test]
async fn test_counters_survive_router_restart() {
    let dir = TempDir::new().unwrap();
    let clock = clock();
    let open = || -> Arc<dyn CounterStore> {
        Arc::new(FileCounterStore::open(dir.path()).unwrap())
    };
    let reg = || registry(vec![provider("a", ModelConfig::new("m1", 2, 100))]);

    {
        let router = RouterBuilder::new(reg())
            .adapter("a", ScriptedAdapter::replying("a"))
            .store(open())
            .clock(clock.clone())
            .build()
            .unwrap();
        router.submit(request()).await.unwrap();
        router.submit(request()).await.unwrap();
        router.shutdown().unwrap();
    }

    clock.advance(Duration::from_secs(10));
    let router = RouterBuilder::new(reg())
        .adapter("a", ScriptedAdapter::replying("a"))
        .store(open())
        .clock(clock.clone())
        .build()
        .unwrap();

    let quota = &router.quota_snapshot()[0];
    assert_eq!((quota.usage.requests_this_minute, quota.usage.requests_today), (2, 2));
    assert_eq!((quota.rpm, quota.rpd), (2, 100));

    let err = router.submit(request()).await.unwrap_err();
    assert_eq!(err.attempts()[0].reason.code(), "rate_limited");
}
