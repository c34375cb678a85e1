//! Rate limit tracker.
//!
//! Keeps per-candidate counters for the current wall-clock minute and UTC
//! day. A reservation is atomic per candidate: the check, the increment and
//! the durable write all happen under that candidate's mutex, and the
//! increment only becomes visible once the write succeeded.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use llmroute_core::{CandidateKey, Clock, KeyedState, QuotaWindow};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::counter::{CounterStore, StoreKey, WindowRecord};
use crate::error::StoreError;

// ============================================================================
// Types
// ============================================================================

/// Result of a reservation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// The reservation was counted and persisted.
    Reserved,
    /// A window is exhausted.
    Denied {
        /// The window that denied the reservation (day wins if both do).
        window: QuotaWindow,
        /// Time until that window resets.
        retry_after: Duration,
    },
}

impl ReserveOutcome {
    /// Returns true if the reservation was taken.
    pub fn is_reserved(&self) -> bool {
        matches!(self, Self::Reserved)
    }
}

/// Current-window usage for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuotaUsage {
    /// The candidate.
    pub key: CandidateKey,
    /// Reservations in the current minute.
    pub requests_this_minute: u32,
    /// Reservations in the current UTC day.
    pub requests_today: u32,
    /// Time until the minute window resets.
    pub minute_resets_in: Duration,
    /// Time until the day window resets.
    pub day_resets_in: Duration,
}

/// In-memory state for one candidate.
#[derive(Debug, Clone, Default)]
struct UsageCounter {
    minute: Option<WindowRecord>,
    day: Option<WindowRecord>,
}

impl UsageCounter {
    fn slot(&mut self, window: QuotaWindow) -> &mut Option<WindowRecord> {
        match window {
            QuotaWindow::Minute => &mut self.minute,
            QuotaWindow::Day => &mut self.day,
        }
    }

    /// Count in the window containing `now`; an elapsed window counts as zero.
    fn current(&self, window: QuotaWindow, now: DateTime<Utc>) -> u32 {
        let record = match window {
            QuotaWindow::Minute => self.minute,
            QuotaWindow::Day => self.day,
        };
        record
            .filter(|r| window.is_current(r.window_start, now))
            .map_or(0, |r| r.count)
    }

    fn next_record(&self, window: QuotaWindow, now: DateTime<Utc>) -> WindowRecord {
        WindowRecord {
            window_start: window.window_start(now),
            count: self.current(window, now).saturating_add(1),
        }
    }
}

// ============================================================================
// Rate Limit Tracker
// ============================================================================

/// Fixed-window quota tracker with write-before-call persistence.
#[derive(Debug)]
pub struct RateLimitTracker {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    counters: KeyedState<CandidateKey, UsageCounter>,
    enabled: bool,
}

impl RateLimitTracker {
    /// Builds a tracker from everything persisted in `store`.
    ///
    /// Counters whose window has already elapsed are discarded and deleted
    /// from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn open(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let tracker = Self {
            store,
            clock,
            counters: KeyedState::new(),
            enabled: true,
        };
        tracker.reload()?;
        Ok(tracker)
    }

    /// Builds a tracker that grants every reservation and persists nothing.
    pub fn disabled(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            counters: KeyedState::new(),
            enabled: false,
        }
    }

    /// Returns true if limits are enforced.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the store backend name.
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    fn reload(&self) -> Result<(), StoreError> {
        let now = self.clock.now();
        let mut kept = 0usize;
        let mut dropped = 0usize;

        for (key, record) in self.store.load_all()? {
            if key.window.is_current(record.window_start, now) {
                self.counters.with(&key.candidate, UsageCounter::default, |counter| {
                    *counter.slot(key.window) = Some(record);
                });
                kept += 1;
            } else {
                dropped += 1;
                if let Err(e) = self.store.remove(&key) {
                    warn!(key = %key, error = %e, "Failed to delete elapsed counter");
                }
            }
        }

        info!(
            backend = self.store.backend(),
            kept, dropped, "Restored rate limit counters"
        );
        Ok(())
    }

    /// Tries to take one reservation for `key` under the given limits.
    ///
    /// The day window is checked first, then the minute window. On success
    /// both counters are incremented and written to the store before this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the durable write fails. The in-memory counters
    /// are rolled back, so the reservation is not counted.
    #[instrument(skip(self, key), fields(candidate = %key))]
    pub fn try_reserve(
        &self,
        key: &CandidateKey,
        rpm: u32,
        rpd: u32,
    ) -> Result<ReserveOutcome, StoreError> {
        if !self.enabled {
            return Ok(ReserveOutcome::Reserved);
        }

        self.counters.with(key, UsageCounter::default, |counter| -> Result<ReserveOutcome, StoreError> {
            let now = self.clock.now();

            for (window, limit) in [(QuotaWindow::Day, rpd), (QuotaWindow::Minute, rpm)] {
                let used = counter.current(window, now);
                if used >= limit {
                    let retry_after = window.retry_after(now);
                    debug!(%window, used, limit, ?retry_after, "Reservation denied");
                    return Ok(ReserveOutcome::Denied {
                        window,
                        retry_after,
                    });
                }
            }

            let minute = counter.next_record(QuotaWindow::Minute, now);
            let day = counter.next_record(QuotaWindow::Day, now);

            self.store.put(&[
                (StoreKey::new(key.clone(), QuotaWindow::Minute), minute),
                (StoreKey::new(key.clone(), QuotaWindow::Day), day),
            ])?;

            counter.minute = Some(minute);
            counter.day = Some(day);
            debug!(minute = minute.count, day = day.count, "Reservation taken");
            Ok(ReserveOutcome::Reserved)
        })
    }

    /// Returns current-window usage for `key`.
    pub fn usage(&self, key: &CandidateKey) -> QuotaUsage {
        let now = self.clock.now();
        let (minute, day) = self.counters.get(key).map_or((0, 0), |slot| {
            let counter = slot
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            (
                counter.current(QuotaWindow::Minute, now),
                counter.current(QuotaWindow::Day, now),
            )
        });

        QuotaUsage {
            key: key.clone(),
            requests_this_minute: minute,
            requests_today: day,
            minute_resets_in: QuotaWindow::Minute.retry_after(now),
            day_resets_in: QuotaWindow::Day.retry_after(now),
        }
    }

    /// Flushes the underlying store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot flush.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.store.flush()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::MemoryCounterStore;
    use chrono::TimeZone;
    use llmroute_core::ManualClock;

    fn setup(at: DateTime<Utc>) -> (Arc<MemoryCounterStore>, Arc<ManualClock>, RateLimitTracker) {
        let store = Arc::new(MemoryCounterStore::new());
        let clock = Arc::new(ManualClock::new(at));
        let tracker = RateLimitTracker::open(store.clone(), clock.clone()).unwrap();
        (store, clock, tracker)
    }

    fn key() -> CandidateKey {
        CandidateKey::new("groq", "llama-3.1-8b-instant")
    }

    #[test]
    fn test_minute_limit_and_reset() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 5).unwrap();
        let (_, clock, tracker) = setup(start);

        for _ in 0..3 {
            assert!(tracker.try_reserve(&key(), 3, 100).unwrap().is_reserved());
        }
        assert_eq!(
            tracker.try_reserve(&key(), 3, 100).unwrap(),
            ReserveOutcome::Denied {
                window: QuotaWindow::Minute,
                retry_after: Duration::from_secs(55),
            }
        );

        clock.advance(Duration::from_secs(55));
        assert!(tracker.try_reserve(&key(), 3, 100).unwrap().is_reserved());
        assert_eq!(tracker.usage(&key()).requests_this_minute, 1);
        assert_eq!(tracker.usage(&key()).requests_today, 4);
    }

    #[test]
    fn test_day_limit_reported_before_minute() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 23, 59, 30).unwrap();
        let (_, clock, tracker) = setup(start);

        assert!(tracker.try_reserve(&key(), 1, 1).unwrap().is_reserved());
        assert_eq!(
            tracker.try_reserve(&key(), 1, 1).unwrap(),
            ReserveOutcome::Denied {
                window: QuotaWindow::Day,
                retry_after: Duration::from_secs(30),
            }
        );

        // 00:00:01 next day belongs to a fresh day window.
        clock.advance(Duration::from_secs(31));
        assert!(tracker.try_reserve(&key(), 1, 1).unwrap().is_reserved());
    }

    #[test]
    fn test_keys_are_independent() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let (_, _, tracker) = setup(start);
        let other = CandidateKey::new("google", "gemini-1.5-flash");

        assert!(tracker.try_reserve(&key(), 1, 10).unwrap().is_reserved());
        assert!(!tracker.try_reserve(&key(), 1, 10).unwrap().is_reserved());
        assert!(tracker.try_reserve(&other, 1, 10).unwrap().is_reserved());
    }

    #[test]
    fn test_persisted_before_return() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let (store, _, tracker) = setup(start);

        tracker.try_reserve(&key(), 5, 10).unwrap();
        let minute = store
            .get(&StoreKey::new(key(), QuotaWindow::Minute))
            .unwrap();
        assert_eq!(minute.count, 1);
        assert_eq!(minute.window_start, start);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let (store, _, tracker) = setup(start);

        store.set_fail_writes(true);
        assert!(tracker.try_reserve(&key(), 1, 10).is_err());
        assert_eq!(tracker.usage(&key()).requests_this_minute, 0);

        store.set_fail_writes(false);
        assert!(tracker.try_reserve(&key(), 1, 10).unwrap().is_reserved());
    }

    #[test]
    fn test_reload_discards_elapsed_windows() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let (store, clock, tracker) = setup(start);
        tracker.try_reserve(&key(), 5, 10).unwrap();
        tracker.try_reserve(&key(), 5, 10).unwrap();
        drop(tracker);

        // Same minute: everything survives.
        let restored = RateLimitTracker::open(store.clone(), clock.clone()).unwrap();
        assert_eq!(restored.usage(&key()).requests_this_minute, 2);
        drop(restored);

        // Next minute: the minute counter is dropped and deleted, the day one kept.
        clock.advance(Duration::from_secs(60));
        let restored = RateLimitTracker::open(store.clone(), clock).unwrap();
        let usage = restored.usage(&key());
        assert_eq!((usage.requests_this_minute, usage.requests_today), (0, 2));
        assert!(store.get(&StoreKey::new(key(), QuotaWindow::Minute)).is_none());
    }

    #[test]
    fn test_disabled_tracker_always_reserves() {
        let store = Arc::new(MemoryCounterStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let tracker = RateLimitTracker::disabled(store.clone(), clock);

        for _ in 0..10 {
            assert!(tracker.try_reserve(&key(), 1, 1).unwrap().is_reserved());
        }
        assert_eq!(store.write_count(), 0);
    }
}
