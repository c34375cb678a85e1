//! JSON output formatting.

use std::time::Duration;

use anyhow::Result;
use llmroute_core::{
    CandidateAttempt, CandidateKey, ModelConfig, ProviderConfig, RouteResult, RouterError,
    TokenUsage,
};
use llmroute_router::QuotaStatus;
use serde::{Serialize, Serializer};

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for a served request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOutput {
    pub text: String,
    pub served_by: String,
    #[serde(serialize_with = "serialize_millis")]
    pub latency_ms: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<AttemptOutput>,
}

/// JSON output for a request no candidate served.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureOutput {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    pub attempts: Vec<AttemptOutput>,
}

/// Why one candidate did not serve a request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptOutput {
    pub candidate: String,
    pub reason: &'static str,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl From<&CandidateAttempt> for AttemptOutput {
    fn from(attempt: &CandidateAttempt) -> Self {
        let invoked = attempt.reason.was_invoked() || !attempt.elapsed.is_zero();
        Self {
            candidate: attempt.key.to_string(),
            reason: attempt.reason.code(),
            detail: attempt.reason.to_string(),
            retry_after_secs: attempt.reason.retry_after().map(|d| d.as_secs()),
            elapsed_ms: invoked.then(|| millis(attempt.elapsed)),
        }
    }
}

/// Quota usage of one candidate.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaOutput {
    pub candidate: String,
    pub requests_this_minute: u32,
    pub rpm: u32,
    pub requests_today: u32,
    pub rpd: u32,
    pub minute_resets_in_secs: u64,
    pub day_resets_in_secs: u64,
}

impl From<&QuotaStatus> for QuotaOutput {
    fn from(status: &QuotaStatus) -> Self {
        Self {
            candidate: status.usage.key.to_string(),
            requests_this_minute: status.usage.requests_this_minute,
            rpm: status.rpm,
            requests_today: status.usage.requests_today,
            rpd: status.rpd,
            minute_resets_in_secs: status.usage.minute_resets_in.as_secs(),
            day_resets_in_secs: status.usage.day_resets_in.as_secs(),
        }
    }
}

/// One configured model, as listed by `providers`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderInfoOutput {
    pub candidate: String,
    pub provider: String,
    pub kind: String,
    pub model: String,
    /// Position in the global order; absent when the provider is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<usize>,
    pub enabled: bool,
    pub credentials: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    pub rpm: u32,
    pub rpd: u32,
    pub timeout_secs: u64,
}

impl ProviderInfoOutput {
    /// Creates a row for `model` of `provider`.
    pub fn new(
        provider: &ProviderConfig,
        model: &ModelConfig,
        priority: Option<usize>,
        credentials: bool,
    ) -> Self {
        Self {
            candidate: CandidateKey::new(&provider.name, &model.model).to_string(),
            provider: provider.name.clone(),
            kind: provider.kind.cli_name().to_string(),
            model: model.model.clone(),
            priority,
            enabled: provider.enabled,
            credentials,
            api_key_env: provider.api_key_env().map(str::to_string),
            rpm: model.rpm,
            rpd: model.rpd,
            timeout_secs: model.timeout_secs,
        }
    }
}

/// Result of probing one candidate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckOutput {
    pub candidate: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckOutput {
    /// Converts the outcome of a single-candidate request.
    pub fn new(key: &CandidateKey, outcome: &Result<RouteResult, RouterError>) -> Self {
        match outcome {
            Ok(result) => Self {
                candidate: key.to_string(),
                ok: true,
                latency_ms: Some(millis(result.latency)),
                reply: Some(result.response.text.clone()),
                reason: None,
                error: None,
            },
            Err(e) => {
                let attempt = e.attempts().iter().find(|a| &a.key == key);
                Self {
                    candidate: key.to_string(),
                    ok: false,
                    latency_ms: None,
                    reply: None,
                    reason: attempt.map(|a| a.reason.code()),
                    error: Some(attempt.map_or_else(|| e.to_string(), |a| a.reason.to_string())),
                }
            }
        }
    }
}

// ============================================================================
// Serialization helpers
// ============================================================================

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_millis<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_u64(millis(*d))
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable value.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(data)?
        } else {
            serde_json::to_string(data)?
        };
        Ok(json)
    }

    /// Formats a served request.
    pub fn format_query_result(&self, result: &RouteResult) -> Result<String> {
        self.format(&self.query_output(result))
    }

    /// Formats a routing failure.
    pub fn format_failure(&self, error: &RouterError) -> Result<String> {
        self.format(&self.failure_output(error))
    }

    /// Formats quota usage for every candidate.
    pub fn format_usage(&self, quotas: &[QuotaStatus]) -> Result<String> {
        let outputs: Vec<QuotaOutput> = quotas.iter().map(QuotaOutput::from).collect();
        self.format(&outputs)
    }

    fn query_output(&self, result: &RouteResult) -> QueryOutput {
        QueryOutput {
            text: result.response.text.clone(),
            served_by: result.served_by.to_string(),
            latency_ms: result.latency,
            usage: result.response.usage,
            skipped: result.skipped.iter().map(AttemptOutput::from).collect(),
        }
    }

    fn failure_output(&self, error: &RouterError) -> FailureOutput {
        let code = match error {
            RouterError::AllProvidersExhausted { .. } => "all_providers_exhausted",
            RouterError::DeadlineExceeded { .. } => "deadline_exceeded",
        };
        FailureOutput {
            error: code,
            message: error.to_string(),
            retry_after_secs: error.earliest_retry().map(|d| d.as_secs()),
            attempts: error.attempts().iter().map(AttemptOutput::from).collect(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
