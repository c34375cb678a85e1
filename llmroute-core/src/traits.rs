//! Trait definitions for `llmroute`.
//!
//! This module defines the capability every provider adapter implements.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::AdapterError;
use crate::models::{CompletionRequest, CompletionResponse, ProviderKind};

/// A provider's wire protocol behind the canonical request contract.
///
/// Implementors are responsible for:
/// - Attaching credentials and provider-specific headers
/// - Translating [`CompletionRequest`] into the provider's payload
/// - Mapping HTTP status codes and bodies onto [`AdapterError`]
///
/// An adapter never retries and never sleeps; fallback is the router's job.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Returns the kind of provider this implementation handles.
    fn kind(&self) -> ProviderKind;

    /// Returns the display name for this provider.
    fn display_name(&self) -> &str {
        self.kind().display_name()
    }

    /// Returns true if the adapter has everything it needs to make calls.
    fn is_configured(&self) -> bool {
        true
    }

    /// Sends one completion request to `model`.
    ///
    /// The call must give up after `timeout` and report
    /// [`AdapterError::Timeout`].
    async fn invoke(
        &self,
        model: &str,
        request: &CompletionRequest,
        timeout: Duration,
    ) -> Result<CompletionResponse, AdapterError>;
}
