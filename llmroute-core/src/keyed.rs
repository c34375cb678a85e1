//! Map of independently locked per-key state.
//!
//! The outer map lock is held only long enough to look up or insert a slot.
//! All real work happens under the slot's own mutex, so callers working on
//! different keys never wait on each other.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

/// Lazily populated map of `Arc<Mutex<V>>` slots.
#[derive(Debug)]
pub struct KeyedState<K, V> {
    slots: RwLock<HashMap<K, Arc<Mutex<V>>>>,
}

impl<K, V> Default for KeyedState<K, V> {
    fn default() -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> KeyedState<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the slot for `key`, creating it with `init` on first use.
    pub fn slot(&self, key: &K, init: impl FnOnce() -> V) -> Arc<Mutex<V>> {
        if let Some(slot) = self.get(key) {
            return slot;
        }

        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(init()))),
        )
    }

    /// Returns the slot for `key` if it exists.
    pub fn get(&self, key: &K) -> Option<Arc<Mutex<V>>> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Runs `f` with exclusive access to the value for `key`.
    pub fn with<R>(&self, key: &K, init: impl FnOnce() -> V, f: impl FnOnce(&mut V) -> R) -> R {
        let slot = self.slot(key, init);
        let mut guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl<K, V> KeyedState<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Copies every value out, locking one slot at a time.
    pub fn snapshot(&self) -> Vec<(K, V)> {
        let slots: Vec<(K, Arc<Mutex<V>>)> = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();

        slots
            .into_iter()
            .map(|(k, slot)| {
                let value = slot.lock().unwrap_or_else(PoisonError::into_inner).clone();
                (k, value)
            })
            .collect()
    }
}
