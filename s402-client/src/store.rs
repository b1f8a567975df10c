//! Key/value storage backing the audit ledger.
//!
//! The ledger only assumes the small [`KvStore`] surface, so records can be
//! persisted anywhere; [`MemoryStore`] is the default process-local backend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

/// A concurrent string-keyed JSON store with optional per-entry TTL.
pub trait KvStore: Send + Sync {
    /// Reads a value. Expired entries read as absent.
    fn get(&self, key: &str) -> Option<Value>;

    /// Writes a value, optionally bounded by a time-to-live.
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>);

    /// Returns `true` when a live entry exists under `key`.
    fn has(&self, key: &str) -> bool;

    /// Deletes an entry; returns `true` when one existed.
    fn delete(&self, key: &str) -> bool;

    /// Removes every entry.
    fn clear(&self);
}

/// Default number of entries a [`MemoryStore`] holds before evicting.
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    seq: u64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// In-memory [`KvStore`] with lazy expiry and capacity eviction.
///
/// Expired entries are dropped on access. When an insert would exceed the
/// configured capacity, the oldest 10% of entries by insertion order are
/// evicted first.
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    capacity: usize,
    seq: AtomicU64,
}

impl MemoryStore {
    /// Creates a store with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a store bounded at `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            capacity: capacity.max(1),
            seq: AtomicU64::new(0),
        }
    }

    /// Number of live entries (expired entries may still be counted until
    /// touched).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict_oldest(&self) {
        let mut by_age: Vec<(String, u64)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().seq))
            .collect();
        by_age.sort_unstable_by_key(|(_, seq)| *seq);
        let drop_count = (self.capacity / 10).max(1);
        for (key, _) in by_age.into_iter().take(drop_count) {
            self.entries.remove(&key);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        } else {
            return None;
        }
        self.entries.remove(key);
        None
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        if !self.entries.contains_key(key) && self.entries.len() >= self.capacity {
            self.evict_oldest();
        }
        let entry = Entry {
            value,
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.insert(key.to_owned(), entry);
    }

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn clear(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete() {
        let store = MemoryStore::new();
        store.set("a", Value::from(1), None);
        assert_eq!(store.get("a"), Some(Value::from(1)));
        assert!(store.has("a"));
        assert!(store.delete("a"));
        assert!(!store.delete("a"));
        assert!(store.get("a").is_none());
    }

    #[test]
    fn expired_entries_read_as_absent() {
        let store = MemoryStore::new();
        store.set("gone", Value::from("x"), Some(Duration::ZERO));
        store.set("kept", Value::from("y"), Some(Duration::from_secs(3600)));
        assert!(store.get("gone").is_none());
        assert!(!store.has("gone"));
        assert_eq!(store.get("kept"), Some(Value::from("y")));
    }

    #[test]
    fn eviction_drops_oldest_tenth() {
        let store = MemoryStore::with_capacity(10);
        for i in 0..10 {
            store.set(&format!("k{i}"), Value::from(i), None);
        }
        store.set("k10", Value::from(10), None);
        // k0 was the oldest and is gone; the newcomer and the rest remain.
        assert!(store.get("k0").is_none());
        assert_eq!(store.get("k10"), Some(Value::from(10)));
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn overwrite_does_not_evict() {
        let store = MemoryStore::with_capacity(2);
        store.set("a", Value::from(1), None);
        store.set("b", Value::from(2), None);
        store.set("a", Value::from(3), None);
        assert_eq!(store.get("a"), Some(Value::from(3)));
        assert_eq!(store.get("b"), Some(Value::from(2)));
    }

    #[test]
    fn clear_empties_the_store() {
        let store = MemoryStore::new();
        store.set("a", Value::from(1), None);
        store.clear();
        assert!(store.is_empty());
    }
}
