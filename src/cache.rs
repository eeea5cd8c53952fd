//! Bounded LRU cache for query answers.
//!
//! Entries carry a monotonically increasing access stamp; a `BTreeMap` from
//! stamp to key keeps them in recency order, so eviction and refresh are
//! both `O(log n)`. The whole structure sits behind one mutex that is never
//! held across an await.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use crate::models::{CachedAnswer, Route};

/// Cache key: the normalized query text plus the route it was answered on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub query: String,
    pub route: Route,
}

impl CacheKey {
    pub fn new(query: &str, route: Route) -> Self {
        Self {
            query: normalize_query(query),
            route,
        }
    }
}

/// Lowercases and collapses whitespace so trivially different spellings of
/// a query share a cache entry.
pub fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

struct LruMap<K, V> {
    entries: HashMap<K, (V, u64)>,
    order: BTreeMap<u64, K>,
    tick: u64,
    capacity: usize,
}

impl<K, V> LruMap<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            order: BTreeMap::new(),
            tick: 0,
            capacity,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn get(&mut self, key: &K) -> Option<V> {
        let tick = self.next_tick();
        let (value, stamp) = self.entries.get_mut(key)?;
        self.order.remove(&*stamp);
        *stamp = tick;
        self.order.insert(tick, key.clone());
        Some(value.clone())
    }

    /// Inserts or replaces `key`, returning the evicted key, if any.
    fn put(&mut self, key: K, value: V) -> Option<K> {
        if self.capacity == 0 {
            return None;
        }
        let tick = self.next_tick();

        if let Some((old_value, stamp)) = self.entries.get_mut(&key) {
            *old_value = value;
            self.order.remove(&*stamp);
            *stamp = tick;
            self.order.insert(tick, key);
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            self.order.pop_first().map(|(_, oldest)| {
                self.entries.remove(&oldest);
                oldest
            })
        } else {
            None
        };

        self.order.insert(tick, key.clone());
        self.entries.insert(key, (value, tick));
        evicted
    }

    fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Thread-safe answer cache keyed by [`CacheKey`].
pub struct ResultCache {
    inner: Mutex<LruMap<CacheKey, CachedAnswer>>,
    capacity: usize,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruMap::new(capacity)),
            capacity,
        }
    }

    /// Returns the cached answer and marks it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<CachedAnswer> {
        self.lock().get(key)
    }

    /// Stores `answer`, evicting the least recently used entry when full.
    /// Returns the evicted key.
    pub fn put(&self, key: CacheKey, answer: CachedAnswer) -> Option<CacheKey> {
        self.lock().put(key, answer)
    }

    /// Membership check that does not touch recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruMap<CacheKey, CachedAnswer>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
