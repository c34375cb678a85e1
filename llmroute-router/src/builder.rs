//! Router construction.
//!
//! The builder wires the registry, adapters, counter store, and clock
//! together. Providers without an adapter or without credentials are
//! disabled here, with a warning, so the routing loop never sees them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use llmroute_core::{Clock, ProviderAdapter, ProviderRegistry, SystemClock};
use llmroute_providers::AdapterRegistry;
use llmroute_store::{
    open_counter_store, CircuitBreakerConfig, CounterStore, MemoryCounterStore, RateLimitTracker,
    RouterConfig,
};
use tracing::{info, warn};

use crate::breaker::CircuitBreaker;
use crate::error::BuildError;
use crate::recorder::{UsageRecorder, DEFAULT_LATENCY_WINDOW};
use crate::router::Router;

/// Builder for [`Router`].
pub struct RouterBuilder {
    registry: ProviderRegistry,
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    store: Option<Arc<dyn CounterStore>>,
    clock: Option<Arc<dyn Clock>>,
    breaker: CircuitBreakerConfig,
    rate_limiting: bool,
    deadline: Option<Duration>,
    latency_window: usize,
}

impl RouterBuilder {
    /// Creates a builder with no adapters, an in-memory store, and the
    /// system clock.
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            adapters: HashMap::new(),
            store: None,
            clock: None,
            breaker: CircuitBreakerConfig::default(),
            rate_limiting: true,
            deadline: None,
            latency_window: DEFAULT_LATENCY_WINDOW,
        }
    }

    /// Creates a builder from a loaded configuration file.
    ///
    /// Builds the registry, one adapter per enabled provider, and opens the
    /// configured counter store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the counter
    /// store cannot be opened.
    pub fn from_config(config: &RouterConfig) -> Result<Self, BuildError> {
        let registry = config.registry()?;
        let adapters = AdapterRegistry::from_configs(registry.providers()).into_map();
        let store: Arc<dyn CounterStore> = if config.rate_limiting.enabled {
            open_counter_store(&config.rate_limiting)?
        } else {
            Arc::new(MemoryCounterStore::new())
        };

        Ok(Self::new(registry)
            .adapters(adapters)
            .store(store)
            .circuit_breaker(config.circuit_breaker)
            .rate_limiting(config.rate_limiting.enabled)
            .deadline(config.router.deadline()))
    }

    /// Registers the adapter for a provider name.
    pub fn adapter(mut self, provider: impl Into<String>, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(provider.into(), adapter);
        self
    }

    /// Registers several adapters at once.
    pub fn adapters(mut self, adapters: HashMap<String, Arc<dyn ProviderAdapter>>) -> Self {
        self.adapters.extend(adapters);
        self
    }

    /// Sets the counter store.
    pub fn store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the clock used for quota windows and cooldowns.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the circuit breaker thresholds.
    pub fn circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = config;
        self
    }

    /// Enables or disables quota enforcement.
    pub fn rate_limiting(mut self, enabled: bool) -> Self {
        self.rate_limiting = enabled;
        self
    }

    /// Sets the deadline applied to requests that carry none.
    pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Sets how many latency samples the recorder keeps per candidate.
    pub fn latency_window(mut self, samples: usize) -> Self {
        self.latency_window = samples;
        self
    }

    /// Builds the router.
    ///
    /// # Errors
    ///
    /// Returns an error if the circuit breaker thresholds are out of range
    /// or persisted counters cannot be loaded.
    pub fn build(self) -> Result<Router, BuildError> {
        self.breaker.validate()?;
        let mut registry = self.registry;
        let adapters = self.adapters;

        let enabled: Vec<String> = registry
            .providers()
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.name.clone())
            .collect();
        for name in enabled {
            match adapters.get(&name) {
                None => {
                    warn!(provider = %name, "No adapter for provider, disabling it");
                    registry.disable_provider(&name);
                }
                Some(adapter) if !adapter.is_configured() => {
                    let env = registry
                        .provider(&name)
                        .and_then(|p| p.api_key_env())
                        .unwrap_or("<none>")
                        .to_string();
                    warn!(provider = %name, api_key_env = %env, "Credentials missing, disabling provider");
                    registry.disable_provider(&name);
                }
                Some(_) => {}
            }
        }

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCounterStore::new()));
        let tracker = if self.rate_limiting {
            RateLimitTracker::open(store, clock.clone())?
        } else {
            info!("Rate limiting disabled");
            RateLimitTracker::disabled(store, clock.clone())
        };

        if registry.is_empty() {
            warn!("No enabled candidates; every request will be exhausted");
        }
        info!(
            candidates = registry.len(),
            backend = tracker.backend(),
            "Router ready"
        );

        Ok(Router {
            registry,
            adapters,
            tracker,
            breaker: CircuitBreaker::new(self.breaker, clock),
            recorder: UsageRecorder::with_window(self.latency_window),
            default_deadline: self.deadline,
        })
    }
}

impl std::fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("candidates", &self.registry.len())
            .field("adapters", &self.adapters.len())
            .field("rate_limiting", &self.rate_limiting)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
