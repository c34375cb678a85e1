//! Provider-related types.
//!
//! This module contains the static configuration the router is built from:
//! - [`ProviderKind`] - Enum of supported provider adapters
//! - [`ProviderConfig`] - One configured provider with its models
//! - [`ModelConfig`] - Quota limits and call timeout for one model
//! - [`CandidateKey`] - `(provider, model)` identity used everywhere else

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Separator between provider and model in a candidate key.
pub const KEY_SEPARATOR: char = ':';

// ============================================================================
// Provider Kind
// ============================================================================

/// Supported provider adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions
    OpenAi,
    /// Anthropic messages API
    Anthropic,
    /// Google Gemini `generateContent`
    Google,
    /// Groq (OpenAI-compatible)
    Groq,
    /// OpenRouter (OpenAI-compatible)
    OpenRouter,
    /// Local Ollama server
    Ollama,
}

impl ProviderKind {
    /// Returns the display name for this provider.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::Google => "Google Gemini",
            Self::Groq => "Groq",
            Self::OpenRouter => "OpenRouter",
            Self::Ollama => "Ollama",
        }
    }

    /// Returns all available provider kinds.
    pub fn all() -> &'static [ProviderKind] {
        &[
            Self::OpenAi,
            Self::Anthropic,
            Self::Google,
            Self::Groq,
            Self::OpenRouter,
            Self::Ollama,
        ]
    }

    /// Returns the CLI/config name for this provider (lowercase, no spaces).
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
            Self::Groq => "groq",
            Self::OpenRouter => "openrouter",
            Self::Ollama => "ollama",
        }
    }

    /// Environment variable the API key is read from unless overridden.
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Google => Some("GOOGLE_API_KEY"),
            Self::Groq => Some("GROQ_API_KEY"),
            Self::OpenRouter => Some("OPENROUTER_API_KEY"),
            Self::Ollama => None,
        }
    }

    /// Default API base URL.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::Anthropic => "https://api.anthropic.com",
            Self::Google => "https://generativelanguage.googleapis.com",
            Self::Groq => "https://api.groq.com",
            Self::OpenRouter => "https://openrouter.ai",
            Self::Ollama => "http://localhost:11434",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            "google" | "gemini" => Ok(Self::Google),
            "groq" => Ok(Self::Groq),
            "openrouter" => Ok(Self::OpenRouter),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::UnknownProviderKind(other.to_string())),
        }
    }
}

// ============================================================================
// Model Configuration
// ============================================================================

/// Quota limits and call timeout for one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider-side model identifier.
    pub model: String,
    /// Requests per wall-clock minute.
    pub rpm: u32,
    /// Requests per UTC day.
    pub rpd: u32,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl ModelConfig {
    /// Creates a model with the given limits and a 30 second timeout.
    pub fn new(model: impl Into<String>, rpm: u32, rpd: u32) -> Self {
        Self {
            model: model.into(),
            rpm,
            rpd,
            timeout_secs: 30,
        }
    }

    /// Sets the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Returns the per-call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// One configured provider and its models, in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name; the first half of every candidate key.
    pub name: String,
    /// Which adapter serves this provider.
    pub kind: ProviderKind,
    /// Disabled providers are validated but never routed to.
    pub enabled: bool,
    /// Environment variable holding the API key (kind default when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// API base URL override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Models in priority order.
    pub models: Vec<ModelConfig>,
}

impl ProviderConfig {
    /// Creates an enabled provider with no models.
    pub fn new(name: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled: true,
            api_key_env: None,
            base_url: None,
            models: Vec::new(),
        }
    }

    /// Appends a model (lowest priority so far).
    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.models.push(model);
        self
    }

    /// Sets the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns the environment variable the API key is read from.
    pub fn api_key_env(&self) -> Option<&str> {
        self.api_key_env
            .as_deref()
            .or_else(|| self.kind.default_api_key_env())
    }

    /// Reads the API key from the environment. Empty values count as missing.
    pub fn api_key(&self) -> Option<String> {
        let var = self.api_key_env()?;
        std::env::var(var).ok().filter(|v| !v.trim().is_empty())
    }

    /// Returns the API base URL, without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.kind.default_base_url())
            .trim_end_matches('/')
    }
}

// ============================================================================
// Candidate Key
// ============================================================================

/// `(provider, model)` identity of a routing candidate.
///
/// Rendered as `provider:model`. Provider names never contain `:`, so model
/// identifiers such as `llama3:8b` survive a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CandidateKey {
    /// Provider name.
    pub provider: String,
    /// Model identifier.
    pub model: String,
}

impl CandidateKey {
    /// Creates a key.
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for CandidateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.provider, self.model)
    }
}

impl FromStr for CandidateKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once(KEY_SEPARATOR) {
            Some((provider, model)) if !provider.is_empty() && !model.is_empty() => {
                Ok(Self::new(provider, model))
            }
            _ => Err(ConfigError::InvalidCandidate(s.to_string())),
        }
    }
}

impl TryFrom<String> for CandidateKey {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CandidateKey> for String {
    fn from(key: CandidateKey) -> Self {
        key.to_string()
    }
}
