//! The routing loop.
//!
//! Candidates are tried in priority order until one serves the request:
//! circuit breaker check, quota reservation (persisted before the call),
//! then the adapter call bounded by the model timeout and the remaining
//! request deadline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use llmroute_core::{
    AdapterError, Candidate, CandidateAttempt, CandidateFailure, CompletionRequest,
    CompletionResponse, ProviderAdapter, ProviderRegistry, Resolution, RouteRequest, RouteResult,
    RouterError,
};
use llmroute_store::{QuotaUsage, RateLimitTracker, ReserveOutcome, StoreError};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::breaker::{CircuitBreaker, CircuitStatus};
use crate::builder::RouterBuilder;
use crate::recorder::{UsageEvent, UsageRecorder, UsageStats};

// ============================================================================
// Attempt Outcome
// ============================================================================

/// What happened to one candidate.
enum Attempt {
    Served(CompletionResponse, Duration),
    Skipped(CandidateFailure),
    Failed(CandidateFailure, Duration),
    DeadlineExceeded(Duration),
}

/// Quota usage of a candidate together with its limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaStatus {
    /// Current-window counts.
    #[serde(flatten)]
    pub usage: QuotaUsage,
    /// Requests-per-minute limit.
    pub rpm: u32,
    /// Requests-per-day limit.
    pub rpd: u32,
}

/// Picks the timeout for one call and whether it is the request deadline.
///
/// When the remaining deadline is no longer than the model timeout, the
/// deadline is what ends the call, so its expiry is not a provider failure.
fn call_budget(model_timeout: Duration, remaining: Option<Duration>) -> (Duration, bool) {
    match remaining {
        Some(left) if left <= model_timeout => (left, true),
        _ => (model_timeout, false),
    }
}

// ============================================================================
// Router
// ============================================================================

/// Quota-aware router over a fixed set of candidates.
///
/// A router owns its tracker, breaker, and recorder; several routers can
/// coexist in one process. `submit` may be called concurrently.
pub struct Router {
    pub(crate) registry: ProviderRegistry,
    pub(crate) adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    pub(crate) tracker: RateLimitTracker,
    pub(crate) breaker: CircuitBreaker,
    pub(crate) recorder: UsageRecorder,
    pub(crate) default_deadline: Option<Duration>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("candidates", &self.registry.len())
            .field("backend", &self.tracker.backend())
            .field("rate_limiting", &self.tracker.is_enabled())
            .field("default_deadline", &self.default_deadline)
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Returns a builder for the given registry.
    pub fn builder(registry: ProviderRegistry) -> RouterBuilder {
        RouterBuilder::new(registry)
    }

    /// Routes one request.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::AllProvidersExhausted`] when no candidate
    /// served the request, or [`RouterError::DeadlineExceeded`] when the
    /// deadline expired first. Both carry one entry per candidate.
    #[instrument(
        skip(self, request),
        fields(prompt_len = request.payload.prompt.len(), overridden = request.priority_override.is_some())
    )]
    pub async fn submit(&self, request: RouteRequest) -> Result<RouteResult, RouterError> {
        let started = Instant::now();
        let deadline = request.deadline.or(self.default_deadline);
        let plan = self.registry.resolve(request.priority_override.as_deref());
        let mut attempts = Vec::with_capacity(plan.len());
        let mut plan = plan.into_iter();

        debug!(candidates = plan.len(), ?deadline, "Routing request");

        while let Some(resolution) = plan.next() {
            let candidate = match resolution {
                Resolution::Registered(candidate) => candidate,
                Resolution::Unregistered(key) => {
                    debug!(candidate = %key, "Override names an unregistered candidate");
                    attempts.push(CandidateAttempt::skipped(key, CandidateFailure::Unregistered));
                    continue;
                }
            };

            let remaining = deadline.map(|d| d.saturating_sub(started.elapsed()));
            if remaining.is_some_and(|r| r.is_zero()) {
                attempts.push(CandidateAttempt::skipped(
                    candidate.key,
                    CandidateFailure::DeadlineExceeded,
                ));
                return Err(Self::deadline_exceeded(deadline, attempts, plan));
            }

            match self.attempt(&candidate, &request.payload, remaining).await {
                Attempt::Served(response, latency) => {
                    info!(
                        provider = %candidate.key.provider,
                        model = %candidate.key.model,
                        latency_ms = latency.as_millis(),
                        skipped = attempts.len(),
                        "Request served"
                    );
                    return Ok(RouteResult {
                        response,
                        served_by: candidate.key,
                        latency,
                        skipped: attempts,
                    });
                }
                Attempt::Skipped(reason) => {
                    attempts.push(CandidateAttempt::skipped(candidate.key, reason));
                }
                Attempt::Failed(reason, elapsed) => {
                    attempts.push(CandidateAttempt::failed(candidate.key, reason, elapsed));
                }
                Attempt::DeadlineExceeded(elapsed) => {
                    attempts.push(CandidateAttempt::failed(
                        candidate.key,
                        CandidateFailure::DeadlineExceeded,
                        elapsed,
                    ));
                    return Err(Self::deadline_exceeded(deadline, attempts, plan));
                }
            }
        }

        warn!(candidates = attempts.len(), "All providers exhausted");
        Err(RouterError::AllProvidersExhausted { attempts })
    }

    /// Closes out the remaining plan after the deadline fired.
    ///
    /// Unregistered override entries keep their own reason.
    fn deadline_exceeded(
        deadline: Option<Duration>,
        mut attempts: Vec<CandidateAttempt>,
        rest: impl Iterator<Item = Resolution>,
    ) -> RouterError {
        for resolution in rest {
            let attempt = match resolution {
                Resolution::Registered(c) => {
                    CandidateAttempt::skipped(c.key, CandidateFailure::DeadlineExceeded)
                }
                Resolution::Unregistered(key) => {
                    CandidateAttempt::skipped(key, CandidateFailure::Unregistered)
                }
            };
            attempts.push(attempt);
        }
        warn!(candidates = attempts.len(), ?deadline, "Request deadline exceeded");
        RouterError::DeadlineExceeded {
            deadline: deadline.unwrap_or_default(),
            attempts,
        }
    }

    async fn attempt(
        &self,
        candidate: &Candidate,
        payload: &CompletionRequest,
        remaining: Option<Duration>,
    ) -> Attempt {
        let key = &candidate.key;

        let Some(adapter) = self.adapters.get(&key.provider) else {
            return Attempt::Skipped(CandidateFailure::Unregistered);
        };

        let permit = match self.breaker.try_acquire(key) {
            Ok(permit) => permit,
            Err(retry_after) => {
                debug!(candidate = %key, ?retry_after, "Circuit open, skipping");
                return Attempt::Skipped(CandidateFailure::CircuitOpen { retry_after });
            }
        };

        match self.tracker.try_reserve(key, candidate.rpm, candidate.rpd) {
            Ok(ReserveOutcome::Reserved) => {}
            Ok(ReserveOutcome::Denied {
                window,
                retry_after,
            }) => {
                debug!(candidate = %key, %window, ?retry_after, "Quota exhausted, skipping");
                return Attempt::Skipped(CandidateFailure::RateLimited {
                    window,
                    retry_after,
                });
            }
            Err(e) => {
                warn!(
                    candidate = %key,
                    error = %e,
                    retryable = e.is_transient(),
                    "Could not record reservation, skipping"
                );
                return Attempt::Skipped(CandidateFailure::Persistence(e.to_string()));
            }
        }

        let (timeout, deadline_bound) = call_budget(candidate.timeout, remaining);

        debug!(candidate = %key, timeout_ms = timeout.as_millis(), trial = permit.is_trial(), "Invoking provider");
        let call_started = Instant::now();
        let result = tokio::time::timeout(timeout, adapter.invoke(&key.model, payload, timeout)).await;
        let elapsed = call_started.elapsed();

        let result = match result {
            Ok(result) => result,
            Err(_) if deadline_bound => return Attempt::DeadlineExceeded(elapsed),
            Err(_) => Err(AdapterError::Timeout(timeout)),
        };

        match result {
            Ok(response) => {
                permit.succeed();
                self.recorder.record(UsageEvent::success(key.clone(), elapsed));
                Attempt::Served(response, elapsed)
            }
            Err(AdapterError::Timeout(_)) if deadline_bound => Attempt::DeadlineExceeded(elapsed),
            Err(e) => {
                warn!(candidate = %key, error = %e, kind = %e.kind(), "Provider call failed");
                self.recorder
                    .record(UsageEvent::failure(key.clone(), e.kind(), elapsed));
                if e.trips_breaker() {
                    permit.fail();
                }
                Attempt::Failed(CandidateFailure::Adapter(e), elapsed)
            }
        }
    }

    // ========================================================================
    // Read-only views
    // ========================================================================

    /// Returns the registered candidates in global priority order.
    pub fn candidates(&self) -> &[Candidate] {
        self.registry.candidates()
    }

    /// Returns the registry the router was built with.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Returns the adapter serving `provider`.
    pub fn adapter(&self, provider: &str) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.get(provider)
    }

    /// Returns per-candidate call statistics.
    pub fn usage_snapshot(&self) -> Vec<UsageStats> {
        self.recorder.snapshot()
    }

    /// Returns the usage recorder, e.g. to subscribe to updates.
    pub fn recorder(&self) -> &UsageRecorder {
        &self.recorder
    }

    /// Returns current-window quota usage for every registered candidate.
    pub fn quota_snapshot(&self) -> Vec<QuotaStatus> {
        self.registry
            .candidates()
            .iter()
            .map(|c| QuotaStatus {
                usage: self.tracker.usage(&c.key),
                rpm: c.rpm,
                rpd: c.rpd,
            })
            .collect()
    }

    /// Returns breaker state for every candidate called so far.
    pub fn circuit_states(&self) -> Vec<CircuitStatus> {
        self.breaker.states()
    }

    /// Returns true if quota limits are enforced.
    pub fn rate_limiting_enabled(&self) -> bool {
        self.tracker.is_enabled()
    }

    /// Returns the counter store backend name.
    pub fn store_backend(&self) -> &'static str {
        self.tracker.backend()
    }

    /// Flushes persisted counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store cannot flush.
    pub fn shutdown(&self) -> Result<(), StoreError> {
        self.tracker.flush()?;
        info!(backend = self.tracker.backend(), "Router shut down");
        Ok(())
    }
}
