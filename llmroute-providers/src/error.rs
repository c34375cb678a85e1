//! HTTP-level error types and their mapping onto [`AdapterError`].

use std::time::Duration;

use llmroute_core::AdapterError;
use thiserror::Error;

// ============================================================================
// HTTP Error
// ============================================================================

/// Transport failure before a usable response arrived.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request could not be sent or the body could not be read.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The URL points outside the provider's host.
    #[error("Domain not allowed: {0}")]
    DomainNotAllowed(String),

    /// The URL could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A header value contained characters HTTP does not allow.
    #[error("Invalid header {0}")]
    InvalidHeader(&'static str),
}

impl HttpError {
    /// Converts the transport failure into the canonical adapter error.
    ///
    /// `timeout` is the budget that was applied to the call.
    pub fn into_adapter_error(self, timeout: Duration) -> AdapterError {
        match self {
            Self::Request(e) if e.is_timeout() => AdapterError::Timeout(timeout),
            Self::Request(e) if e.is_decode() => AdapterError::InvalidResponse(e.to_string()),
            Self::Request(e) if e.is_connect() => {
                AdapterError::unreachable(format!("connection failed: {e}"))
            }
            Self::Request(e) => AdapterError::unreachable(e.to_string()),
            Self::InvalidHeader(name) => {
                AdapterError::AuthError(format!("credential for {name} is not a valid header value"))
            }
            other @ (Self::DomainNotAllowed(_) | Self::InvalidUrl(_)) => {
                AdapterError::unreachable(other.to_string())
            }
        }
    }
}
