//! Monotonic ID assignment for host objects and worker threads.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Concurrent map assigning stable sequential IDs to host-side keys
/// (pointer addresses, thread IDs) on first sight.
pub struct IdRegistry<K> {
    entries: RwLock<HashMap<K, u64>>,
    next_id: AtomicU64,
}

impl<K: Eq + Hash + Clone> IdRegistry<K> {
    pub fn new(first_id: u64) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(first_id),
        }
    }

    /// Look up the ID for `key` without assigning one.
    pub fn get(&self, key: &K) -> Option<u64> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
    }

    /// ID for `key`, assigning the next sequential ID on first sight.
    /// The boolean reports whether the assignment was fresh.
    pub fn assign(&self, key: K) -> (u64, bool) {
        if let Some(id) = self.get(&key) {
            return (id, false);
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have won the race between the read and here.
        if let Some(id) = entries.get(&key) {
            return (*id, false);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        entries.insert(key, id);
        (id, true)
    }

    /// Every known ID, in assignment order.
    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .copied()
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
