//! Configuration management.
//!
//! The router is configured from a YAML file. Models may omit `rpm`, `rpd`
//! and `timeout`, in which case they inherit the top-level `defaults`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use llmroute_core::{ConfigError, ModelConfig, ProviderConfig, ProviderKind, ProviderRegistry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::persistence::{default_config_path, default_counter_path, expand_home, write_atomic};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "LLMROUTE_CONFIG";

/// Longest cooldown the circuit breaker accepts (one week).
pub const MAX_COOLDOWN_SECS: u64 = 7 * 24 * 3600;

// ============================================================================
// Sections
// ============================================================================

/// Limits inherited by models that do not set their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDefaults {
    /// Requests per minute.
    #[serde(default = "default_rpm")]
    pub rpm: u32,
    /// Requests per UTC day.
    #[serde(default = "default_rpd")]
    pub rpd: u32,
    /// Call timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

/// Where quota counters are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per counter key in a directory.
    #[default]
    Json,
    /// A single SQLite database file.
    Sqlite,
    /// Process memory only; counters are lost on exit.
    Memory,
}

/// Rate limiting settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// When false every reservation succeeds and nothing is persisted.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Counter backend.
    #[serde(default)]
    pub storage_backend: StorageBackend,
    /// Directory (json) or file (sqlite); defaults under the cache dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<PathBuf>,
}

impl RateLimitingConfig {
    /// Returns the storage path with `~` expanded and defaults applied.
    pub fn resolved_storage_path(&self) -> PathBuf {
        match &self.storage_path {
            Some(path) => expand_home(path),
            None => default_counter_path(self.storage_backend == StorageBackend::Sqlite),
        }
    }
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// First cooldown, in seconds.
    #[serde(default = "default_base_cooldown")]
    pub base_cooldown_secs: u64,
    /// Cooldown ceiling, in seconds.
    #[serde(default = "default_max_cooldown")]
    pub max_cooldown_secs: u64,
}

impl CircuitBreakerConfig {
    /// Returns the first cooldown.
    pub fn base_cooldown(&self) -> Duration {
        Duration::from_secs(self.base_cooldown_secs)
    }

    /// Returns the cooldown ceiling.
    pub fn max_cooldown(&self) -> Duration {
        Duration::from_secs(self.max_cooldown_secs)
    }

    /// Checks that the thresholds describe a breaker that can open and
    /// close again.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBreaker`] for a zero threshold or
    /// cooldown, a base cooldown above the ceiling, or a ceiling above
    /// [`MAX_COOLDOWN_SECS`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::InvalidBreaker(
                "failure_threshold must be at least 1".into(),
            ));
        }
        if self.base_cooldown_secs == 0 {
            return Err(ConfigError::InvalidBreaker(
                "base_cooldown_secs must be greater than zero".into(),
            ));
        }
        if self.base_cooldown_secs > self.max_cooldown_secs {
            return Err(ConfigError::InvalidBreaker(format!(
                "base_cooldown_secs ({}) exceeds max_cooldown_secs ({})",
                self.base_cooldown_secs, self.max_cooldown_secs
            )));
        }
        if self.max_cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(ConfigError::InvalidBreaker(format!(
                "max_cooldown_secs ({}) exceeds the limit of {MAX_COOLDOWN_SECS}",
                self.max_cooldown_secs
            )));
        }
        Ok(())
    }
}

/// Router-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterSettings {
    /// Default request deadline in seconds; `null` means unbounded.
    #[serde(default = "default_deadline")]
    pub deadline_secs: Option<u64>,
}

impl RouterSettings {
    /// Returns the default request deadline.
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

/// One model as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Provider-side model identifier.
    pub model: String,
    /// Requests per minute (defaults apply when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpm: Option<u32>,
    /// Requests per day (defaults apply when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpd: Option<u32>,
    /// Call timeout in seconds (defaults apply when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// One provider as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    /// Unique provider name.
    pub name: String,
    /// Adapter kind; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Whether the provider is routed to.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Environment variable holding the API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// API base URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Models in priority order.
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

fn default_rpm() -> u32 {
    10
}

fn default_rpd() -> u32 {
    1000
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_base_cooldown() -> u64 {
    60
}

fn default_max_cooldown() -> u64 {
    900
}

#[allow(clippy::unnecessary_wraps)]
fn default_deadline() -> Option<u64> {
    Some(120)
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            rpm: default_rpm(),
            rpd: default_rpd(),
            timeout: default_timeout(),
        }
    }
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage_backend: StorageBackend::default(),
            storage_path: None,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            base_cooldown_secs: default_base_cooldown(),
            max_cooldown_secs: default_max_cooldown(),
        }
    }
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline(),
        }
    }
}

// ============================================================================
// Router Config
// ============================================================================

/// Complete router configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Limits inherited by models.
    #[serde(default)]
    pub defaults: ModelDefaults,
    /// Quota tracking.
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,
    /// Failure isolation.
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    /// Request handling.
    #[serde(default)]
    pub router: RouterSettings,
    /// Providers in priority order.
    #[serde(default)]
    pub providers: Vec<ProviderEntry>,
}

impl RouterConfig {
    /// Returns the config path: `$LLMROUTE_CONFIG` if set, else the default.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path)
    }

    /// Loads configuration from the default path.
    ///
    /// # Errors
    ///
    /// See [`RouterConfig::load_from`].
    pub fn load() -> Result<Self, StoreError> {
        Self::load_from(&Self::default_path())
    }

    /// Loads configuration from a specific path.
    ///
    /// A missing file yields the default (empty) configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&content)?;

        info!(path = %path.display(), providers = config.providers.len(), "Loaded configuration");
        Ok(config)
    }

    /// Parses configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration YAML.
    pub fn from_yaml(content: &str) -> Result<Self, StoreError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Serializes the configuration to YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&self) -> Result<String, StoreError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Saves configuration to a specific path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save_to(&self, path: &Path) -> Result<(), StoreError> {
        write_atomic(path, self.to_yaml()?.as_bytes())?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    /// Resolves providers into core configuration with defaults applied.
    ///
    /// # Errors
    ///
    /// Returns an error if a provider kind is unknown.
    pub fn provider_configs(&self) -> Result<Vec<ProviderConfig>, StoreError> {
        self.providers
            .iter()
            .map(|entry| -> Result<ProviderConfig, StoreError> {
                let kind: ProviderKind = entry.kind.as_deref().unwrap_or(&entry.name).parse()?;
                Ok(ProviderConfig {
                    name: entry.name.clone(),
                    kind,
                    enabled: entry.enabled,
                    api_key_env: entry.api_key_env.clone(),
                    base_url: entry.base_url.clone(),
                    models: entry
                        .models
                        .iter()
                        .map(|m| ModelConfig {
                            model: m.model.clone(),
                            rpm: m.rpm.unwrap_or(self.defaults.rpm),
                            rpd: m.rpd.unwrap_or(self.defaults.rpd),
                            timeout_secs: m.timeout.unwrap_or(self.defaults.timeout),
                        })
                        .collect(),
                })
            })
            .collect()
    }

    /// Resolves and validates providers into a registry.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown kinds, invalid limits and names, or
    /// out-of-range circuit breaker thresholds.
    pub fn registry(&self) -> Result<ProviderRegistry, StoreError> {
        self.circuit_breaker.validate()?;
        Ok(ProviderRegistry::new(self.provider_configs()?)?)
    }

    /// Returns a commented starter configuration.
    pub fn example_yaml() -> &'static str {
        EXAMPLE_CONFIG
    }
}

const EXAMPLE_CONFIG: &str = r"# llmroute configuration
#
# Providers are tried in the order listed; within a provider, models are
# tried in the order listed. Models inherit rpm/rpd/timeout from `defaults`.

defaults:
  rpm: 10
  rpd: 1000
  timeout: 30

rate_limiting:
  enabled: true
  storage_backend: json        # json | sqlite | memory
  # storage_path: ~/.cache/llmroute/counters

circuit_breaker:
  failure_threshold: 3
  base_cooldown_secs: 60
  max_cooldown_secs: 900

router:
  deadline_secs: 120

providers:
  - name: groq
    api_key_env: GROQ_API_KEY
    models:
      - model: llama-3.1-8b-instant
        rpm: 30
        rpd: 14400
      - model: llama-3.3-70b-versatile
        rpm: 30
        rpd: 1000

  - name: google
    models:
      - model: gemini-1.5-flash
        rpm: 15
        rpd: 1500

  - name: openrouter
    models:
      - model: meta-llama/llama-3.1-8b-instruct:free
        rpm: 20
        rpd: 200

  - name: local
    kind: ollama
    enabled: false
    base_url: http://localhost:11434
    models:
      - model: llama3.1:8b
        rpm: 60
        rpd: 100000
        timeout: 120
";

// ============================================================================
// Tests
// ============================================================================
