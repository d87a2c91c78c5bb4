//! Bounded insert-or-skip cache shared by concurrent requests.
//!
//! Once the cache holds `capacity` entries, inserts of new keys are dropped.
//! There is no eviction and no invalidation: entries live as long as the
//! cache. Writers racing on the same key store the same value, so the last
//! write winning is harmless. The bound is approximate under races.

use dashmap::DashMap;
use serde::Serialize;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hit/miss/skip counters for one cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Inserts dropped because the cache was full
    pub skipped: u64,
    pub entries: usize,
}

pub struct BoundedCache<K, V> {
    map: DashMap<K, V>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    skipped: AtomicU64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            map: DashMap::new(),
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        match self.map.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Upsert `value`, or drop it if the cache is full and `key` is new.
    /// Returns whether the value was stored.
    pub fn insert(&self, key: K, value: V) -> bool {
        if self.map.len() >= self.capacity && !self.map.contains_key(&key) {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        self.map.insert(key, value);
        true
    }

    /// Return the cached value for `key`, computing and caching it on a miss.
    pub fn get_or_insert_with<F>(&self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        let value = compute();
        self.insert(key, value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            entries: self.map.len(),
        }
    }
}
