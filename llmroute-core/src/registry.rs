//! Provider registry.
//!
//! The registry validates provider configuration once at startup and turns
//! it into a flat, ordered candidate list: providers in configured order,
//! and within each provider its models in configured order. Position in that
//! list is the candidate's priority.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::ConfigError;
use crate::models::{CandidateKey, KEY_SEPARATOR, ProviderConfig, ProviderKind};

// ============================================================================
// Candidate
// ============================================================================

/// One routable `(provider, model)` pair with its limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Identity.
    pub key: CandidateKey,
    /// Adapter kind serving this candidate.
    pub kind: ProviderKind,
    /// Requests per wall-clock minute.
    pub rpm: u32,
    /// Requests per UTC day.
    pub rpd: u32,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Global priority; 0 is tried first.
    pub priority: usize,
}

/// One step of a resolved candidate order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A registered, enabled candidate.
    Registered(Candidate),
    /// An override entry that names nothing routable.
    Unregistered(CandidateKey),
}

impl Resolution {
    /// Returns the key of this step.
    pub fn key(&self) -> &CandidateKey {
        match self {
            Self::Registered(c) => &c.key,
            Self::Unregistered(key) => key,
        }
    }
}

// ============================================================================
// Provider Registry
// ============================================================================

/// Validated provider configuration and the global candidate order.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
    candidates: Vec<Candidate>,
    index: HashMap<CandidateKey, usize>,
}

impl ProviderRegistry {
    /// Validates `providers` and builds the candidate list.
    ///
    /// Disabled providers are validated too, so that flipping `enabled`
    /// never turns a working config into a broken one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for empty or malformed names, zero limits or
    /// timeouts, and duplicate `(provider, model)` pairs.
    pub fn new(providers: Vec<ProviderConfig>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();

        for provider in &providers {
            if provider.name.trim().is_empty() || provider.name.contains(KEY_SEPARATOR) {
                return Err(ConfigError::InvalidName(provider.name.clone()));
            }

            for model in &provider.models {
                if model.model.trim().is_empty() {
                    return Err(ConfigError::InvalidName(model.model.clone()));
                }

                let key = CandidateKey::new(&provider.name, &model.model);
                if model.rpm == 0 {
                    return Err(ConfigError::InvalidLimit { key, field: "rpm" });
                }
                if model.rpd == 0 {
                    return Err(ConfigError::InvalidLimit { key, field: "rpd" });
                }
                if model.timeout_secs == 0 {
                    return Err(ConfigError::InvalidTimeout(key));
                }
                if !seen.insert(key.clone()) {
                    return Err(ConfigError::DuplicateCandidate(key));
                }
            }
        }

        let mut registry = Self {
            providers,
            candidates: Vec::new(),
            index: HashMap::new(),
        };
        registry.rebuild();

        debug!(
            providers = registry.providers.len(),
            candidates = registry.candidates.len(),
            "Provider registry built"
        );
        Ok(registry)
    }

    fn rebuild(&mut self) {
        self.candidates = self
            .providers
            .iter()
            .filter(|p| p.enabled)
            .flat_map(|p| p.models.iter().map(move |m| (p, m)))
            .enumerate()
            .map(|(priority, (p, m))| Candidate {
                key: CandidateKey::new(&p.name, &m.model),
                kind: p.kind,
                rpm: m.rpm,
                rpd: m.rpd,
                timeout: m.timeout(),
                priority,
            })
            .collect();

        self.index = self
            .candidates
            .iter()
            .enumerate()
            .map(|(i, c)| (c.key.clone(), i))
            .collect();
    }

    /// Removes a provider from routing, keeping its configuration visible.
    ///
    /// Returns the number of candidates removed.
    pub fn disable_provider(&mut self, name: &str) -> usize {
        let before = self.candidates.len();
        let mut found = false;
        for provider in self.providers.iter_mut().filter(|p| p.name == name) {
            provider.enabled = false;
            found = true;
        }
        if !found {
            warn!(provider = %name, "Tried to disable unknown provider");
            return 0;
        }

        self.rebuild();
        before - self.candidates.len()
    }

    /// Returns all configured providers, enabled or not.
    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    /// Looks up a provider by name.
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Returns enabled candidates in global priority order.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Looks up an enabled candidate.
    pub fn get(&self, key: &CandidateKey) -> Option<&Candidate> {
        self.index.get(key).map(|&i| &self.candidates[i])
    }

    /// Returns the number of enabled candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Returns true if nothing is routable.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Resolves the candidate order for one request.
    ///
    /// Without an override this is the global order. With one, the
    /// override's order is used as given; entries naming no enabled
    /// candidate are kept as [`Resolution::Unregistered`] so the caller can
    /// report them, and repeated entries are tried once.
    pub fn resolve(&self, priority_override: Option<&[CandidateKey]>) -> Vec<Resolution> {
        let Some(order) = priority_override else {
            return self
                .candidates
                .iter()
                .cloned()
                .map(Resolution::Registered)
                .collect();
        };

        let mut seen = HashSet::new();
        order
            .iter()
            .filter(|key| seen.insert(*key))
            .map(|key| match self.get(key) {
                Some(candidate) => Resolution::Registered(candidate.clone()),
                None => {
                    debug!(candidate = %key, "Override names an unregistered candidate");
                    Resolution::Unregistered(key.clone())
                }
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
