//! Canonical request/response payloads and the routing contract.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::provider::CandidateKey;
use crate::error::CandidateAttempt;

// ============================================================================
// Completion Payloads
// ============================================================================

/// Provider-independent completion request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// User prompt.
    pub prompt: String,
    /// Optional system prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Optional output token cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Optional sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Creates a request with just a prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// Sets the system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Sets the output token cap.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Token accounting, when the provider reports it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens.
    pub input_tokens: u32,
    /// Generated tokens.
    pub output_tokens: u32,
}

impl TokenUsage {
    /// Returns input plus output tokens.
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Provider-independent completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text.
    pub text: String,
    /// Token usage, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl CompletionResponse {
    /// Creates a response without usage information.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

// ============================================================================
// Routing Contract
// ============================================================================

/// A request submitted to the router.
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    /// The payload sent to whichever candidate serves the request.
    pub payload: CompletionRequest,
    /// Caller-specific candidate order. Does not affect other callers.
    pub priority_override: Option<Vec<CandidateKey>>,
    /// Time budget for the whole routing loop.
    pub deadline: Option<Duration>,
}

impl RouteRequest {
    /// Creates a request using the global candidate order.
    pub fn new(payload: CompletionRequest) -> Self {
        Self {
            payload,
            priority_override: None,
            deadline: None,
        }
    }

    /// Replaces the candidate order for this request only.
    pub fn with_override(mut self, order: Vec<CandidateKey>) -> Self {
        self.priority_override = Some(order);
        self
    }

    /// Bounds the whole request by `deadline`.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// A successfully routed request.
#[derive(Debug, Clone)]
pub struct RouteResult {
    /// The provider's answer.
    pub response: CompletionResponse,
    /// The candidate that served it.
    pub served_by: CandidateKey,
    /// Latency of the successful call.
    pub latency: Duration,
    /// Candidates skipped or failed before the one that served.
    pub skipped: Vec<CandidateAttempt>,
}
