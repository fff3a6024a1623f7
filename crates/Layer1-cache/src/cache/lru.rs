//! Bounded, weight-aware LRU store
//!
//! Recency is a strict total order: every `get` and `put` stamps the entry
//! with a fresh value of a monotonic counter, so two entries can never tie
//! for "oldest".

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

use crate::{Error, Result};

/// Computes the weight of an entry
pub type WeighFn<K, V> = Box<dyn Fn(&K, &V) -> usize + Send + Sync>;

/// Notified for every evicted entry (logging / metrics only)
pub type EvictionListener<K, V> = Box<dyn Fn(&K, &V, EvictionCause) + Send + Sync>;

/// Why an entry left the store without being removed explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionCause {
    /// Made room for an insert
    Capacity,
    /// Trimmed down to a lower watermark
    Trim,
}

struct LruEntry<V> {
    value: V,
    last_access: u64,
    weight: usize,
}

/// A capacity-bounded store with least-recently-used eviction.
///
/// `current_weight() <= capacity_weight()` holds after every mutating call.
/// An entry heavier than the whole capacity is rejected with
/// [`Error::EntryTooLarge`] instead of being inserted and immediately evicted.
pub struct BoundedLruStore<K, V> {
    /// Storage for cached items
    entries: HashMap<K, LruEntry<V>>,
    /// Recency index: access stamp -> key, oldest first
    order: BTreeMap<u64, K>,
    capacity_weight: usize,
    current_weight: usize,
    /// Access counter for LRU tracking
    access_counter: u64,
    weigh: WeighFn<K, V>,
    on_evict: Option<EvictionListener<K, V>>,
    evictions: u64,
}

impl<K, V> fmt::Debug for BoundedLruStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedLruStore")
            .field("len", &self.entries.len())
            .field("capacity_weight", &self.capacity_weight)
            .field("current_weight", &self.current_weight)
            .field("evictions", &self.evictions)
            .finish()
    }
}

impl<K: Eq + Hash + Clone, V> BoundedLruStore<K, V> {
    /// Store where every entry weighs 1 (capacity is an entry count)
    pub fn new(capacity: usize) -> Self {
        Self::with_weigher(capacity, |_, _| 1)
    }

    /// Store with a custom per-entry weight function
    pub fn with_weigher<F>(capacity_weight: usize, weigh: F) -> Self
    where
        F: Fn(&K, &V) -> usize + Send + Sync + 'static,
    {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            capacity_weight,
            current_weight: 0,
            access_counter: 0,
            weigh: Box::new(weigh),
            on_evict: None,
            evictions: 0,
        }
    }

    /// Install an eviction listener
    pub fn with_eviction_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&K, &V, EvictionCause) + Send + Sync + 'static,
    {
        self.on_evict = Some(Box::new(listener));
        self
    }

    fn next_stamp(&mut self) -> u64 {
        self.access_counter += 1;
        self.access_counter
    }

    /// Move `key` to the most-recently-used position
    fn promote(&mut self, key: &K) -> bool {
        let stamp = self.next_stamp();
        match self.entries.get_mut(key) {
            Some(entry) => {
                self.order.remove(&entry.last_access);
                entry.last_access = stamp;
                self.order.insert(stamp, key.clone());
                true
            }
            None => false,
        }
    }

    /// Look at a value without touching recency
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Check if a key exists without updating recency
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert or replace an entry, evicting least-recently-used entries
    /// (never the one just inserted) until the store fits again.
    ///
    /// Returns the replaced value, if any.
    pub fn put(&mut self, key: K, value: V) -> Result<Option<V>> {
        let weight = (self.weigh)(&key, &value);
        if weight > self.capacity_weight {
            return Err(Error::too_large(weight, self.capacity_weight));
        }

        let stamp = self.next_stamp();
        let previous = match self.entries.get_mut(&key) {
            Some(entry) => {
                self.order.remove(&entry.last_access);
                self.current_weight = self.current_weight.saturating_sub(entry.weight) + weight;
                entry.last_access = stamp;
                entry.weight = weight;
                Some(std::mem::replace(&mut entry.value, value))
            }
            None => {
                self.current_weight += weight;
                self.entries.insert(
                    key.clone(),
                    LruEntry {
                        value,
                        last_access: stamp,
                        weight,
                    },
                );
                None
            }
        };
        self.order.insert(stamp, key);

        while self.current_weight > self.capacity_weight {
            if !self.evict_oldest(EvictionCause::Capacity, Some(stamp)) {
                break;
            }
        }

        debug_assert!(self.current_weight <= self.capacity_weight);
        Ok(previous)
    }

    /// Evict the least recently used entry, skipping `protect`
    fn evict_oldest(&mut self, cause: EvictionCause, protect: Option<u64>) -> bool {
        let victim = self
            .order
            .iter()
            .find(|(stamp, _)| Some(**stamp) != protect)
            .map(|(stamp, key)| (*stamp, key.clone()));

        let Some((stamp, key)) = victim else {
            return false;
        };
        self.order.remove(&stamp);
        if let Some(entry) = self.entries.remove(&key) {
            self.current_weight = self.current_weight.saturating_sub(entry.weight);
            self.evictions += 1;
            if let Some(listener) = &self.on_evict {
                listener(&key, &entry.value, cause);
            }
        }
        true
    }

    /// Remove a specific key from the store
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|e| {
            self.order.remove(&e.last_access);
            self.current_weight = self.current_weight.saturating_sub(e.weight);
            e.value
        })
    }

    /// Remove all entries matching a predicate, returning how many went
    pub fn remove_if<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let doomed: Vec<K> = self
            .entries
            .iter()
            .filter(|(k, e)| predicate(*k, &e.value))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &doomed {
            self.remove(key);
        }
        doomed.len()
    }

    /// Evict least-recently-used entries until `current_weight <= target`.
    ///
    /// The capacity itself is unchanged, so repeated calls with the same
    /// target are no-ops once the watermark is reached.
    pub fn trim_to(&mut self, target: usize) -> usize {
        let mut evicted = 0;
        while self.current_weight > target && self.evict_oldest(EvictionCause::Trim, None) {
            evicted += 1;
        }
        evicted
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.current_weight = 0;
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity_weight(&self) -> usize {
        self.capacity_weight
    }

    pub fn current_weight(&self) -> usize {
        self.current_weight
    }

    /// Total number of evictions since creation
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Keys from least to most recently used
    pub fn keys_by_recency(&self) -> Vec<K> {
        self.order.values().cloned().collect()
    }

    /// Iterate over entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, e)| (k, &e.value))
    }
}

impl<K: Eq + Hash + Clone, V: Clone> BoundedLruStore<K, V> {
    /// Get a copy of a value, promoting it to most-recently-used
    pub fn get(&mut self, key: &K) -> Option<V> {
        if self.promote(key) {
            self.entries.get(key).map(|e| e.value.clone())
        } else {
            None
        }
    }
}
