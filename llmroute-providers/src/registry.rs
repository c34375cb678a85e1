//! Adapter construction from provider configuration.
//!
//! Each configured provider gets exactly one adapter, keyed by the
//! provider's configured name. Several providers may share a kind (say two
//! OpenAI-compatible accounts) and still get separate adapters.

use std::collections::HashMap;
use std::sync::Arc;

use llmroute_core::{ProviderAdapter, ProviderConfig, ProviderKind};
use tracing::{debug, warn};

use crate::anthropic::AnthropicAdapter;
use crate::error::HttpError;
use crate::google::GoogleAdapter;
use crate::ollama::OllamaAdapter;
use crate::openai::OpenAiAdapter;

// ============================================================================
// Adapter Registry
// ============================================================================

/// Adapters for a set of providers, keyed by provider name.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.adapters.keys().collect();
        names.sort();
        f.debug_struct("AdapterRegistry")
            .field("providers", &names)
            .finish()
    }
}

impl AdapterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the adapter for a single provider.
    ///
    /// The API key is read from the provider's environment variable now;
    /// a missing key still yields an adapter, which reports
    /// `is_configured() == false`.
    pub fn build(config: &ProviderConfig) -> Result<Arc<dyn ProviderAdapter>, HttpError> {
        let base_url = config.base_url().to_string();
        let api_key = config.api_key();

        let adapter: Arc<dyn ProviderAdapter> = match config.kind {
            kind @ (ProviderKind::OpenAi | ProviderKind::Groq | ProviderKind::OpenRouter) => {
                Arc::new(OpenAiAdapter::new(kind, base_url, api_key)?)
            }
            ProviderKind::Anthropic => Arc::new(AnthropicAdapter::new(base_url, api_key)?),
            ProviderKind::Google => Arc::new(GoogleAdapter::new(base_url, api_key)?),
            ProviderKind::Ollama => Arc::new(OllamaAdapter::new(base_url)?),
        };
        Ok(adapter)
    }

    /// Builds adapters for every enabled provider.
    ///
    /// Providers whose adapter cannot be built (a malformed `base_url`) are
    /// left out with a warning; the router treats them as unavailable.
    pub fn from_configs(providers: &[ProviderConfig]) -> Self {
        let mut registry = Self::new();
        for config in providers.iter().filter(|p| p.enabled) {
            match Self::build(config) {
                Ok(adapter) => {
                    debug!(provider = %config.name, kind = %config.kind, "Adapter built");
                    registry.insert(config.name.clone(), adapter);
                }
                Err(e) => {
                    warn!(provider = %config.name, error = %e, "Could not build adapter");
                }
            }
        }
        registry
    }

    /// Registers an adapter under a provider name, replacing any previous one.
    pub fn insert(&mut self, name: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(name.into(), adapter);
    }

    /// Looks up the adapter for a provider.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ProviderAdapter>> {
        self.adapters.get(name)
    }

    /// Returns true if an adapter exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    /// Returns the number of adapters.
    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    /// Returns true if no adapters are registered.
    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Consumes the registry, returning the name-to-adapter map.
    pub fn into_map(self) -> HashMap<String, Arc<dyn ProviderAdapter>> {
        self.adapters
    }
}

// ============================================================================
// Tests
// ============================================================================
