//! Durable quota counters.
//!
//! Every counter is stored under `{provider}:{model}:{minute|day}` with the
//! value `{windowStart, count}`. Backends only need atomic read-modify-write
//! per key; the tracker serializes writers to the same key itself.

mod file;
mod memory;
mod sqlite;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use llmroute_core::{CandidateKey, QuotaWindow};
use serde::{Deserialize, Serialize};

use crate::config::{RateLimitingConfig, StorageBackend};
use crate::error::StoreError;

pub use file::FileCounterStore;
pub use memory::MemoryCounterStore;
pub use sqlite::SqliteCounterStore;

// ============================================================================
// Keys and Values
// ============================================================================

/// Persisted counter key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreKey {
    /// The candidate.
    pub candidate: CandidateKey,
    /// Which window this counter belongs to.
    pub window: QuotaWindow,
}

impl StoreKey {
    /// Creates a key.
    pub fn new(candidate: CandidateKey, window: QuotaWindow) -> Self {
        Self { candidate, window }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.candidate, self.window)
    }
}

impl FromStr for StoreKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (candidate, window) = s
            .rsplit_once(':')
            .ok_or_else(|| StoreError::InvalidKey(s.to_string()))?;
        let window = window
            .parse()
            .map_err(|_| StoreError::InvalidKey(s.to_string()))?;
        let candidate = candidate
            .parse()
            .map_err(|_| StoreError::InvalidKey(s.to_string()))?;
        Ok(Self { candidate, window })
    }
}

/// Persisted counter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowRecord {
    /// Start of the window this count belongs to.
    pub window_start: DateTime<Utc>,
    /// Reservations taken in that window.
    pub count: u32,
}

// ============================================================================
// Counter Store
// ============================================================================

/// Durable storage for quota counters.
///
/// Calls are synchronous: the tracker writes while holding the key's lock,
/// and a reservation only counts once `put` has returned `Ok`.
pub trait CounterStore: Send + Sync + fmt::Debug {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Loads every persisted counter.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium cannot be read.
    fn load_all(&self) -> Result<Vec<(StoreKey, WindowRecord)>, StoreError>;

    /// Durably writes the given counters.
    ///
    /// # Errors
    ///
    /// Returns an error if any record could not be written.
    fn put(&self, records: &[(StoreKey, WindowRecord)]) -> Result<(), StoreError>;

    /// Deletes a counter. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing medium rejects the delete.
    fn remove(&self, key: &StoreKey) -> Result<(), StoreError>;

    /// Flushes anything buffered. Called on shutdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Opens the counter store selected by the configuration.
///
/// # Errors
///
/// Returns an error if the store cannot be created at `path`.
pub fn open_counter_store(
    config: &RateLimitingConfig,
) -> Result<Arc<dyn CounterStore>, StoreError> {
    let path = config.resolved_storage_path();
    open_at(config.storage_backend, &path)
}

fn open_at(backend: StorageBackend, path: &Path) -> Result<Arc<dyn CounterStore>, StoreError> {
    Ok(match backend {
        StorageBackend::Json => Arc::new(FileCounterStore::open(path)?),
        StorageBackend::Sqlite => Arc::new(SqliteCounterStore::open(path)?),
        StorageBackend::Memory => Arc::new(MemoryCounterStore::new()),
    })
}
