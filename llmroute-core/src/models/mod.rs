//! Domain models for `llmroute`.
//!
//! ## Submodules
//!
//! - [`provider`] - Provider configuration (`ProviderKind`, `ProviderConfig`, `ModelConfig`, `CandidateKey`)
//! - [`quota`] - Fixed quota windows (`QuotaWindow`)
//! - [`request`] - Canonical request/response payloads and the routing contract

mod provider;
mod quota;
mod request;

// Re-export everything at the models level
pub use provider::{CandidateKey, KEY_SEPARATOR, ModelConfig, ProviderConfig, ProviderKind};
pub use quota::QuotaWindow;
pub use request::{CompletionRequest, CompletionResponse, RouteRequest, RouteResult, TokenUsage};
