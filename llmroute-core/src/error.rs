//! Core error types for `llmroute`.
//!
//! Three layers of failure exist:
//!
//! - [`ConfigError`] is fatal and only raised while building a registry.
//! - [`AdapterError`] and [`CandidateFailure`] describe why one candidate
//!   did not serve a request. They never leave the router on their own.
//! - [`RouterError`] is the terminal outcome of a request and always
//!   carries one [`CandidateAttempt`] per candidate.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::models::{CandidateKey, QuotaWindow};

// ============================================================================
// Configuration Errors
// ============================================================================

/// Malformed or contradictory configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A model declared a zero request limit.
    #[error("{key}: {field} must be a positive integer")]
    InvalidLimit {
        /// The offending candidate.
        key: CandidateKey,
        /// Which limit (`rpm` or `rpd`).
        field: &'static str,
    },

    /// A model declared a zero timeout.
    #[error("{0}: timeout must be greater than zero")]
    InvalidTimeout(CandidateKey),

    /// The same `(provider, model)` pair appears twice.
    #[error("Duplicate candidate: {0}")]
    DuplicateCandidate(CandidateKey),

    /// A provider or model name is empty or contains the key separator.
    #[error("Invalid name {0:?}: names must be non-empty and provider names may not contain ':'")]
    InvalidName(String),

    /// The provider kind is not one we have an adapter for.
    #[error("Unknown provider kind: {0}")]
    UnknownProviderKind(String),

    /// A candidate string could not be parsed as `provider:model`.
    #[error("Invalid candidate {0:?}: expected provider:model")]
    InvalidCandidate(String),

    /// Circuit breaker thresholds are out of range.
    #[error("circuit_breaker: {0}")]
    InvalidBreaker(String),
}

// ============================================================================
// Adapter Errors
// ============================================================================

/// Canonical failure of a single provider call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    /// The provider itself answered with a rate limit (HTTP 429).
    #[error("Rate limited by provider: {message}")]
    RateLimited {
        /// Provider-suggested wait, when it sent one.
        retry_after: Option<Duration>,
        /// Provider message.
        message: String,
    },

    /// Credentials missing, rejected, or lacking permission.
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Provider-side failure or unreachable endpoint.
    #[error("Server error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    ServerError {
        /// HTTP status, absent for transport failures.
        status: Option<u16>,
        /// Error detail.
        message: String,
    },

    /// The call did not finish within its timeout.
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The provider answered but the body was unusable.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Discriminant of [`AdapterError`], handy for statistics and matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterErrorKind {
    /// See [`AdapterError::RateLimited`].
    RateLimited,
    /// See [`AdapterError::AuthError`].
    AuthError,
    /// See [`AdapterError::ServerError`].
    ServerError,
    /// See [`AdapterError::Timeout`].
    Timeout,
    /// See [`AdapterError::InvalidResponse`].
    InvalidResponse,
}

impl AdapterErrorKind {
    /// Stable snake-case identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::AuthError => "auth_error",
            Self::ServerError => "server_error",
            Self::Timeout => "timeout",
            Self::InvalidResponse => "invalid_response",
        }
    }
}

impl fmt::Display for AdapterErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AdapterError {
    /// Creates a server error with an HTTP status.
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::ServerError {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Creates a server error for a transport failure.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::ServerError {
            status: None,
            message: message.into(),
        }
    }

    /// Creates a provider rate-limit error.
    pub fn rate_limited(retry_after: Option<Duration>, message: impl Into<String>) -> Self {
        Self::RateLimited {
            retry_after,
            message: message.into(),
        }
    }

    /// Returns the error discriminant.
    pub fn kind(&self) -> AdapterErrorKind {
        match self {
            Self::RateLimited { .. } => AdapterErrorKind::RateLimited,
            Self::AuthError(_) => AdapterErrorKind::AuthError,
            Self::ServerError { .. } => AdapterErrorKind::ServerError,
            Self::Timeout(_) => AdapterErrorKind::Timeout,
            Self::InvalidResponse(_) => AdapterErrorKind::InvalidResponse,
        }
    }

    /// Returns true if this failure should count against the circuit breaker.
    ///
    /// A provider-side 429 says nothing about the provider's health.
    pub fn trips_breaker(&self) -> bool {
        !matches!(self, Self::RateLimited { .. })
    }
}

// ============================================================================
// Candidate Failures
// ============================================================================

/// Why a single candidate did not serve a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateFailure {
    /// The circuit breaker is open for this candidate.
    CircuitOpen {
        /// Time until a trial call will be allowed.
        retry_after: Duration,
    },

    /// Our own quota for this candidate is exhausted.
    RateLimited {
        /// The window that denied the reservation.
        window: QuotaWindow,
        /// Time until that window resets.
        retry_after: Duration,
    },

    /// The provider call failed.
    Adapter(AdapterError),

    /// The reservation could not be recorded durably; the provider was not called.
    Persistence(String),

    /// A priority override named a candidate that is not registered or enabled.
    Unregistered,

    /// The request deadline expired before or during this candidate.
    DeadlineExceeded,
}

impl CandidateFailure {
    /// Stable snake-case identifier for output and statistics.
    pub fn code(&self) -> &'static str {
        match self {
            Self::CircuitOpen { .. } => "circuit_open",
            Self::RateLimited { .. } => "rate_limited",
            Self::Adapter(e) => e.kind().as_str(),
            Self::Persistence(_) => "persistence",
            Self::Unregistered => "unregistered",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }

    /// Returns the wait hint attached to this failure, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::CircuitOpen { retry_after } | Self::RateLimited { retry_after, .. } => {
                Some(*retry_after)
            }
            Self::Adapter(AdapterError::RateLimited { retry_after, .. }) => *retry_after,
            _ => None,
        }
    }

    /// Returns true if the provider was actually called.
    pub fn was_invoked(&self) -> bool {
        matches!(self, Self::Adapter(_))
    }
}

impl fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircuitOpen { retry_after } => {
                write!(f, "circuit open, retry in {}s", retry_after.as_secs())
            }
            Self::RateLimited {
                window,
                retry_after,
            } => write!(
                f,
                "{window} quota exhausted, resets in {}s",
                retry_after.as_secs()
            ),
            Self::Adapter(e) => write!(f, "{e}"),
            Self::Persistence(msg) => write!(f, "could not record reservation: {msg}"),
            Self::Unregistered => f.write_str("not a registered candidate"),
            Self::DeadlineExceeded => f.write_str("request deadline exceeded"),
        }
    }
}

impl From<AdapterError> for CandidateFailure {
    fn from(e: AdapterError) -> Self {
        Self::Adapter(e)
    }
}

/// One candidate's outcome within a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateAttempt {
    /// The candidate.
    pub key: CandidateKey,
    /// Why it did not serve the request.
    pub reason: CandidateFailure,
    /// Time spent on this candidate (zero when skipped).
    pub elapsed: Duration,
}

impl CandidateAttempt {
    /// Creates a record for a candidate skipped without a call.
    pub fn skipped(key: CandidateKey, reason: CandidateFailure) -> Self {
        Self {
            key,
            reason,
            elapsed: Duration::ZERO,
        }
    }

    /// Creates a record for a candidate that was invoked.
    pub fn failed(key: CandidateKey, reason: CandidateFailure, elapsed: Duration) -> Self {
        Self {
            key,
            reason,
            elapsed,
        }
    }
}

impl fmt::Display for CandidateAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.reason)
    }
}

// ============================================================================
// Router Errors
// ============================================================================

/// Terminal failure of a routed request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    /// Every candidate was skipped or failed.
    #[error("All providers exhausted ({} candidates tried)", .attempts.len())]
    AllProvidersExhausted {
        /// One entry per candidate, in routing order.
        attempts: Vec<CandidateAttempt>,
    },

    /// The request deadline expired before any candidate succeeded.
    #[error("Deadline of {deadline:?} exceeded ({} candidates)", .attempts.len())]
    DeadlineExceeded {
        /// The deadline that applied.
        deadline: Duration,
        /// One entry per candidate, in routing order.
        attempts: Vec<CandidateAttempt>,
    },
}

impl RouterError {
    /// Returns the per-candidate reasons.
    pub fn attempts(&self) -> &[CandidateAttempt] {
        match self {
            Self::AllProvidersExhausted { attempts } | Self::DeadlineExceeded { attempts, .. } => {
                attempts
            }
        }
    }

    /// Returns the shortest wait hint across all candidates, if any.
    ///
    /// Callers can use this to decide when the next request has a chance.
    pub fn earliest_retry(&self) -> Option<Duration> {
        self.attempts()
            .iter()
            .filter_map(|a| a.reason.retry_after())
            .min()
    }
}
