// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # llmroute Store
//!
//! Configuration and durable state for the llmroute router.
//!
//! This crate provides:
//!
//! - **RouterConfig**: YAML configuration with defaults inherited by models
//! - **CounterStore**: Durable `{provider}:{model}:{minute|day}` counters
//!   backed by per-key JSON files, SQLite, or memory
//! - **RateLimitTracker**: Atomic per-key reservations against fixed
//!   minute and UTC-day windows, persisted before the provider is called
//! - **Persistence**: Default paths and atomic file writes
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use llmroute_core::{CandidateKey, SystemClock};
//! use llmroute_store::{FileCounterStore, RateLimitTracker, ReserveOutcome};
//!
//! let store = Arc::new(FileCounterStore::open("/var/lib/llmroute/counters")?);
//! let tracker = RateLimitTracker::open(store, Arc::new(SystemClock))?;
//!
//! let key = CandidateKey::new("groq", "llama-3.1-8b-instant");
//! match tracker.try_reserve(&key, 30, 14_400)? {
//!     ReserveOutcome::Reserved => { /* call the provider */ }
//!     ReserveOutcome::Denied { retry_after, .. } => { /* try the next one */ }
//! }
//! ```

pub mod config;
pub mod counter;
pub mod error;
pub mod persistence;
pub mod tracker;

pub use config::{
    CircuitBreakerConfig, MAX_COOLDOWN_SECS, ModelDefaults, ModelEntry, ProviderEntry,
    RateLimitingConfig, RouterConfig, RouterSettings, StorageBackend,
};
pub use counter::{
    CounterStore, FileCounterStore, MemoryCounterStore, SqliteCounterStore, StoreKey, WindowRecord,
    open_counter_store,
};
pub use error::StoreError;
pub use persistence::{
    default_cache_dir, default_config_dir, default_config_path, default_counter_path, load_json,
    save_json,
};
pub use tracker::{QuotaUsage, RateLimitTracker, ReserveOutcome};
#[cfg(test)]
mod persistence_tests;
