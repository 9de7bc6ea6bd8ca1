//! Per-operation retry counters.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Retry counters keyed by operation id.
///
/// Clones share the same counters. Only the coordinator mutates them:
/// increment on a retryable failure, removal when a sequence resolves, and
/// the explicit resets it exposes. An absent key means zero retries.
#[derive(Debug, Clone, Default)]
pub struct AttemptStore {
    counts: Arc<Mutex<HashMap<String, u32>>>,
}

impl AttemptStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the retries consumed so far for `operation_id`.
    pub fn get(&self, operation_id: &str) -> u32 {
        self.lock().get(operation_id).copied().unwrap_or(0)
    }

    /// Number of operations with an in-flight retry sequence.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// No retry sequence is in flight.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub(crate) fn increment(&self, operation_id: &str) -> u32 {
        let mut counts = self.lock();
        let count = counts.entry(operation_id.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        *count
    }

    pub(crate) fn remove(&self, operation_id: &str) {
        self.lock().remove(operation_id);
    }

    pub(crate) fn clear(&self) {
        self.lock().clear();
    }

    // A panic while holding the lock cannot leave a counter half-written.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, u32>> {
        self.counts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_key_is_zero() {
        let store = AttemptStore::new();
        assert_eq!(store.get("GET /api/shows"), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_increment_and_remove() {
        let store = AttemptStore::new();
        assert_eq!(store.increment("GET /api/shows"), 1);
        assert_eq!(store.increment("GET /api/shows"), 2);
        assert_eq!(store.get("GET /api/shows"), 2);
        assert_eq!(store.len(), 1);

        store.remove("GET /api/shows");
        assert_eq!(store.get("GET /api/shows"), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_keys_are_independent() {
        let store = AttemptStore::new();
        store.increment("GET /api/venues");
        store.increment("GET /api/crew");
        store.increment("GET /api/crew");

        assert_eq!(store.get("GET /api/venues"), 1);
        assert_eq!(store.get("GET /api/crew"), 2);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_clone_shares_counters() {
        let store = AttemptStore::new();
        let other = store.clone();
        store.increment("POST /api/scripts");
        assert_eq!(other.get("POST /api/scripts"), 1);
    }
}
