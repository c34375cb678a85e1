//! Per-candidate circuit breaker.
//!
//! ```text
//! Closed --(N consecutive failures)--> Open(until)
//! Open   --(cooldown elapsed, next caller)--> HalfOpen (one trial)
//! HalfOpen --success--> Closed
//! HalfOpen --failure--> Open(until), cooldown doubled up to the cap
//! ```
//!
//! Callers ask for a [`CallPermit`] before invoking a provider and settle it
//! with [`CallPermit::succeed`] or [`CallPermit::fail`]. A permit dropped
//! without settling is neutral; if it held the half-open trial slot, the
//! slot is released for the next caller.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use llmroute_core::{CandidateKey, Clock, KeyedState};
use llmroute_store::CircuitBreakerConfig;
use serde::Serialize;
use tracing::{debug, info, warn};

// ============================================================================
// State
// ============================================================================

/// Externally visible breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are refused until `until`.
    Open {
        /// End of the cooldown.
        until: DateTime<Utc>,
    },
    /// One trial call decides whether to close again.
    HalfOpen,
}

impl CircuitState {
    /// Short lowercase label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open { .. } => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Breaker state of one candidate, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CircuitStatus {
    /// The candidate.
    pub key: CandidateKey,
    /// Current state.
    #[serde(flatten)]
    pub state: CircuitState,
    /// Failures since the last success.
    pub consecutive_failures: u32,
    /// Cooldown of the current opening, or of the next one while closed.
    pub cooldown: Duration,
}

#[derive(Debug, Clone)]
struct BreakerEntry {
    state: CircuitState,
    consecutive_failures: u32,
    /// Times the breaker opened without an intervening success.
    trips: u32,
    probe_in_flight: bool,
}

impl Default for BreakerEntry {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            trips: 0,
            probe_in_flight: false,
        }
    }
}

// ============================================================================
// Circuit Breaker
// ============================================================================

/// Circuit breakers for every candidate, created lazily on first use.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    entries: KeyedState<CandidateKey, BreakerEntry>,
}

impl CircuitBreaker {
    /// Creates a breaker set with the given thresholds.
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            entries: KeyedState::new(),
        }
    }

    /// Calculates the cooldown for the `trips`-th consecutive opening.
    pub fn cooldown_for_trip(&self, trips: u32) -> Duration {
        let base = self.config.base_cooldown();
        let factor = 2u32.saturating_pow(trips.saturating_sub(1));
        base.saturating_mul(factor).min(self.config.max_cooldown())
    }

    /// Asks to call `key`.
    ///
    /// # Errors
    ///
    /// Returns the time until the breaker will admit a trial when the
    /// circuit is open, or zero while another caller holds the trial slot.
    pub fn try_acquire(&self, key: &CandidateKey) -> Result<CallPermit<'_>, Duration> {
        let now = self.clock.now();
        let probe = self.entries.with(key, BreakerEntry::default, |entry| {
            match entry.state {
                CircuitState::Closed => Ok(false),
                CircuitState::Open { until } if now < until => {
                    Err((until - now).to_std().unwrap_or(Duration::ZERO))
                }
                CircuitState::Open { .. } => {
                    entry.state = CircuitState::HalfOpen;
                    entry.probe_in_flight = true;
                    debug!(candidate = %key, "Cooldown elapsed, admitting trial call");
                    Ok(true)
                }
                CircuitState::HalfOpen if entry.probe_in_flight => Err(Duration::ZERO),
                CircuitState::HalfOpen => {
                    entry.probe_in_flight = true;
                    Ok(true)
                }
            }
        })?;

        Ok(CallPermit {
            breaker: self,
            key: key.clone(),
            probe,
            settled: false,
        })
    }

    /// Returns the state of `key` without changing it.
    pub fn state(&self, key: &CandidateKey) -> CircuitState {
        self.entries
            .get(key)
            .map_or(CircuitState::Closed, |slot| {
                slot.lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .state
            })
    }

    /// Returns the state of every candidate seen so far, sorted by key.
    pub fn states(&self) -> Vec<CircuitStatus> {
        let mut states: Vec<CircuitStatus> = self
            .entries
            .snapshot()
            .into_iter()
            .map(|(key, entry)| CircuitStatus {
                key,
                state: entry.state,
                consecutive_failures: entry.consecutive_failures,
                cooldown: self.cooldown_for_trip(entry.trips.max(1)),
            })
            .collect();
        states.sort_by(|a, b| a.key.cmp(&b.key));
        states
    }

    fn record_success(&self, key: &CandidateKey) {
        self.entries.with(key, BreakerEntry::default, |entry| {
            if entry.state != CircuitState::Closed {
                info!(candidate = %key, "Circuit closed");
            }
            *entry = BreakerEntry::default();
        });
    }

    fn record_failure(&self, key: &CandidateKey, probe: bool) {
        let now = self.clock.now();
        self.entries.with(key, BreakerEntry::default, |entry| {
            entry.consecutive_failures = entry.consecutive_failures.saturating_add(1);

            let open = match entry.state {
                CircuitState::HalfOpen if probe => {
                    entry.probe_in_flight = false;
                    true
                }
                CircuitState::Closed => entry.consecutive_failures >= self.config.failure_threshold,
                // A call admitted before the circuit opened; the cooldown stands.
                _ => false,
            };

            if open {
                entry.trips = entry.trips.saturating_add(1);
                let cooldown = self.cooldown_for_trip(entry.trips);
                let until = chrono::Duration::from_std(cooldown)
                    .ok()
                    .and_then(|cooldown| now.checked_add_signed(cooldown))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                entry.state = CircuitState::Open { until };
                warn!(
                    candidate = %key,
                    failures = entry.consecutive_failures,
                    cooldown_secs = cooldown.as_secs(),
                    "Circuit opened"
                );
            }
        });
    }

    fn release_probe(&self, key: &CandidateKey) {
        self.entries.with(key, BreakerEntry::default, |entry| {
            if entry.state == CircuitState::HalfOpen {
                entry.probe_in_flight = false;
                debug!(candidate = %key, "Trial slot released unsettled");
            }
        });
    }
}

// ============================================================================
// Call Permit
// ============================================================================

/// Permission to make one call, obtained from [`CircuitBreaker::try_acquire`].
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    key: CandidateKey,
    probe: bool,
    settled: bool,
}

impl CallPermit<'_> {
    /// Returns true if this permit holds the half-open trial slot.
    pub fn is_trial(&self) -> bool {
        self.probe
    }

    /// Reports a successful call, closing the circuit.
    pub fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success(&self.key);
    }

    /// Reports a failed call.
    pub fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure(&self.key, self.probe);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe(&self.key);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
