//! In-memory counters for tests and for running without durability.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{CounterStore, StoreKey, WindowRecord};
use crate::error::StoreError;

/// Counter store that lives and dies with the process.
///
/// Hand the same `Arc` to every tracker that should see the same counters,
/// e.g. to simulate a restart.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    records: Mutex<HashMap<StoreKey, WindowRecord>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryCounterStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `put` fail until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Returns the number of successful `put` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Returns the stored record for `key`.
    pub fn get(&self, key: &StoreKey) -> Option<WindowRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }
}

impl CounterStore for MemoryCounterStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn load_all(&self) -> Result<Vec<(StoreKey, WindowRecord)>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }

    fn put(&self, records: &[(StoreKey, WindowRecord)]) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::WriteRejected("memory store is failing writes".into()));
        }

        let mut map = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, record) in records {
            map.insert(key.clone(), *record);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, key: &StoreKey) -> Result<(), StoreError> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
