//! Store error types.

use llmroute_core::ConfigError;
use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration could not be parsed.
    #[error("Config parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Configuration is well-formed but invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A persisted counter key could not be parsed.
    #[error("Invalid counter key: {0}")]
    InvalidKey(String),

    /// A persisted value could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The backend refused the write.
    #[error("Write rejected: {0}")]
    WriteRejected(String),
}

impl StoreError {
    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Io(_) | StoreError::WriteRejected(_) => true,
            StoreError::Sqlite(e) => matches!(
                e.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
            ),
            _ => false,
        }
    }
}
