//! Usage recorder.
//!
//! Keeps per-candidate call statistics for observability. Recording is a
//! short critical section without I/O; nothing here feeds back into
//! routing decisions.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use llmroute_core::{AdapterErrorKind, CandidateKey};
use serde::Serialize;
use tokio::sync::watch;

/// Default number of latency samples kept per candidate.
pub const DEFAULT_LATENCY_WINDOW: usize = 256;

// ============================================================================
// Events
// ============================================================================

/// Outcome of one provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call returned usable text.
    Success,
    /// The call failed.
    Failure(AdapterErrorKind),
}

/// One provider call, as seen by the recorder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageEvent {
    /// The candidate that was called.
    pub key: CandidateKey,
    /// How the call ended.
    pub outcome: CallOutcome,
    /// Wall time of the call.
    pub latency: Duration,
}

impl UsageEvent {
    /// Creates a success event.
    pub fn success(key: CandidateKey, latency: Duration) -> Self {
        Self {
            key,
            outcome: CallOutcome::Success,
            latency,
        }
    }

    /// Creates a failure event.
    pub fn failure(key: CandidateKey, kind: AdapterErrorKind, latency: Duration) -> Self {
        Self {
            key,
            outcome: CallOutcome::Failure(kind),
            latency,
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Latency summary over the recent sample window, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencySummary {
    /// Number of samples summarized.
    pub samples: usize,
    /// Fastest call.
    pub min_ms: f64,
    /// Arithmetic mean.
    pub mean_ms: f64,
    /// Slowest call.
    pub max_ms: f64,
    /// Median.
    pub p50_ms: f64,
    /// 95th percentile.
    pub p95_ms: f64,
}

impl LatencySummary {
    fn from_samples(samples: &VecDeque<Duration>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted: Vec<f64> = samples.iter().map(|d| d.as_secs_f64() * 1000.0).collect();
        sorted.sort_by(f64::total_cmp);

        #[allow(clippy::cast_precision_loss)]
        let mean = sorted.iter().sum::<f64>() / sorted.len() as f64;

        Some(Self {
            samples: sorted.len(),
            min_ms: sorted[0],
            mean_ms: mean,
            max_ms: sorted[sorted.len() - 1],
            p50_ms: percentile(&sorted, 50),
            p95_ms: percentile(&sorted, 95),
        })
    }
}

/// Nearest-rank percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], pct: usize) -> f64 {
    let rank = (pct * sorted.len()).div_ceil(100).max(1);
    sorted[rank.min(sorted.len()) - 1]
}

/// Per-candidate call statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageStats {
    /// The candidate.
    pub key: CandidateKey,
    /// Calls made.
    pub requests: u64,
    /// Calls that returned text.
    pub successes: u64,
    /// Calls that failed.
    pub failures: u64,
    /// `successes / requests`, zero when no calls were made.
    pub success_rate: f64,
    /// Failures grouped by error kind.
    pub failures_by_kind: BTreeMap<String, u64>,
    /// Latency over the most recent calls.
    pub latency: Option<LatencySummary>,
}

#[derive(Debug, Default)]
struct StatsEntry {
    successes: u64,
    failures: u64,
    failures_by_kind: BTreeMap<String, u64>,
    latencies: VecDeque<Duration>,
}

// ============================================================================
// Usage Recorder
// ============================================================================

/// Collects [`UsageEvent`]s and serves snapshots.
///
/// Every recorded event bumps a version number that dashboards can watch
/// through [`UsageRecorder::subscribe`].
#[derive(Debug)]
pub struct UsageRecorder {
    entries: Mutex<HashMap<CandidateKey, StatsEntry>>,
    window: usize,
    version: watch::Sender<u64>,
}

impl UsageRecorder {
    /// Creates a recorder keeping [`DEFAULT_LATENCY_WINDOW`] samples.
    pub fn new() -> Self {
        Self::with_window(DEFAULT_LATENCY_WINDOW)
    }

    /// Creates a recorder keeping `window` latency samples per candidate.
    pub fn with_window(window: usize) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            entries: Mutex::new(HashMap::new()),
            window: window.max(1),
            version,
        }
    }

    /// Records one call.
    pub fn record(&self, event: UsageEvent) {
        {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = entries.entry(event.key).or_default();
            match event.outcome {
                CallOutcome::Success => entry.successes += 1,
                CallOutcome::Failure(kind) => {
                    entry.failures += 1;
                    *entry
                        .failures_by_kind
                        .entry(kind.as_str().to_string())
                        .or_default() += 1;
                }
            }
            if entry.latencies.len() == self.window {
                entry.latencies.pop_front();
            }
            entry.latencies.push_back(event.latency);
        }
        self.version.send_modify(|v| *v += 1);
    }

    /// Returns statistics for every candidate called so far, sorted by key.
    pub fn snapshot(&self) -> Vec<UsageStats> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stats: Vec<UsageStats> = entries
            .iter()
            .map(|(key, entry)| {
                let requests = entry.successes + entry.failures;
                #[allow(clippy::cast_precision_loss)]
                let success_rate = if requests == 0 {
                    0.0
                } else {
                    entry.successes as f64 / requests as f64
                };
                UsageStats {
                    key: key.clone(),
                    requests,
                    successes: entry.successes,
                    failures: entry.failures,
                    success_rate,
                    failures_by_kind: entry.failures_by_kind.clone(),
                    latency: LatencySummary::from_samples(&entry.latencies),
                }
            })
            .collect();
        stats.sort_by(|a, b| a.key.cmp(&b.key));
        stats
    }

    /// Returns a receiver that observes the event count.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    /// Returns the number of events recorded.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }
}

impl Default for UsageRecorder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
