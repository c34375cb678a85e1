// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `llmroute` Core
//!
//! Core types, errors, and traits shared by every `llmroute` crate.
//!
//! This crate provides:
//!
//! - Domain models (provider/model configuration, candidate keys, requests)
//! - The error taxonomy surfaced by the router
//! - The [`ProviderAdapter`] capability trait and the injectable [`Clock`]
//! - The [`ProviderRegistry`], which turns configuration into an ordered
//!   candidate list
//! - [`KeyedState`], a map of per-key mutexes used by the rate limit
//!   tracker and the circuit breaker
//!
//! ## Key Types
//!
//! ### Configuration
//! - [`ProviderKind`] - Enum of all supported provider adapters
//! - [`ProviderConfig`] - One provider and its models
//! - [`ModelConfig`] - Per-model quota limits and call timeout
//!
//! ### Routing
//! - [`CandidateKey`] - `(provider, model)` identity
//! - [`RouteRequest`] / [`RouteResult`] - The router's request contract
//! - [`RouterError`] - Terminal failure with per-candidate reasons

pub mod clock;
pub mod error;
pub mod keyed;
pub mod models;
pub mod registry;
pub mod traits;

// Re-export error types
pub use error::{
    AdapterError, AdapterErrorKind, CandidateAttempt, CandidateFailure, ConfigError, RouterError,
};

// Re-export all model types
pub use models::{
    // Provider configuration
    CandidateKey,
    ModelConfig,
    ProviderConfig,
    ProviderKind,
    // Quota windows
    QuotaWindow,
    // Requests
    CompletionRequest,
    CompletionResponse,
    RouteRequest,
    RouteResult,
    TokenUsage,
};

pub use clock::{Clock, ManualClock, SystemClock};
pub use keyed::KeyedState;
pub use registry::{Candidate, ProviderRegistry, Resolution};
pub use traits::ProviderAdapter;
