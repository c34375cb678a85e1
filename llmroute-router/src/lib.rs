// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `llmroute` Router
//!
//! The routing core: given an ordered list of `(provider, model)`
//! candidates, serve each request from the highest-priority candidate that
//! is healthy and within quota.
//!
//! ## Components
//!
//! - [`Router`] - The routing loop and its read-only views
//! - [`RouterBuilder`] - Wires registry, adapters, store, and clock
//! - [`CircuitBreaker`] - Closed / Open / HalfOpen per candidate with
//!   exponential cooldown
//! - [`UsageRecorder`] - Call counts, success rates, and latency
//!   percentiles
//!
//! Quota tracking lives in `llmroute-store`, adapters in
//! `llmroute-providers`.
//!
//! ## Example
//!
//! ```ignore
//! use llmroute_core::{CompletionRequest, RouteRequest};
//! use llmroute_router::RouterBuilder;
//! use llmroute_store::RouterConfig;
//!
//! let config = RouterConfig::load()?;
//! let router = RouterBuilder::from_config(&config)?.build()?;
//!
//! let result = router
//!     .submit(RouteRequest::new(CompletionRequest::new("Hello")))
//!     .await?;
//! println!("{} (via {})", result.response.text, result.served_by);
//! router.shutdown()?;
//! ```

pub mod breaker;
pub mod builder;
pub mod error;
pub mod recorder;
pub mod router;

pub use breaker::{CallPermit, CircuitBreaker, CircuitState, CircuitStatus};
pub use builder::RouterBuilder;
pub use error::BuildError;
pub use recorder::{CallOutcome, LatencySummary, UsageEvent, UsageRecorder, UsageStats};
pub use router::{QuotaStatus, Router};
