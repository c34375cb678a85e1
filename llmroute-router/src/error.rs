//! Router construction errors.
//!
//! Routing itself never fails with these; a request's terminal outcome is
//! a [`RouterError`](llmroute_core::RouterError).

use llmroute_core::ConfigError;
use llmroute_store::StoreError;
use thiserror::Error;

/// Error raised while building a [`Router`](crate::Router).
#[derive(Debug, Error)]
pub enum BuildError {
    /// The provider configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The counter store could not be opened or read.
    #[error("Counter store error: {0}")]
    Store(#[from] StoreError),
}
