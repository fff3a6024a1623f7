//! Memoizer: LRU + TTL cache bound to one async compute function
//!
//! ## Single-flight
//!
//! By default concurrent misses on the same key are collapsed: the first
//! caller computes, the others wait on a per-key gate and then read the
//! stored value. With `with_single_flight(false)` every concurrent caller
//! computes on its own and the last write wins.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::cache::{BoundedLruStore, TimedEntry};

type Gates<K> = Mutex<HashMap<K, Arc<AsyncMutex<()>>>>;

/// Removes the key's gate when its last holder finishes or is dropped
struct GateGuard<'a, K: Eq + Hash> {
    inflight: &'a Gates<K>,
    key: K,
    gate: Arc<AsyncMutex<()>>,
}

impl<K: Eq + Hash> Drop for GateGuard<'_, K> {
    fn drop(&mut self) {
        let mut inflight = self.inflight.lock();
        // the map and this guard hold the only references
        let last_holder = inflight.get(&self.key).map_or(false, |g| {
            Arc::ptr_eq(g, &self.gate) && Arc::strong_count(&self.gate) == 2
        });
        if last_holder {
            inflight.remove(&self.key);
        }
    }
}

pub struct Memoizer<K, V, F> {
    compute: F,
    store: Mutex<BoundedLruStore<K, TimedEntry<V>>>,
    ttl: Duration,
    /// Per-key gates for in-flight computations
    inflight: Gates<K>,
    single_flight: bool,
}

impl<K, V, F> fmt::Debug for Memoizer<K, V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoizer")
            .field("store", &*self.store.lock())
            .field("ttl", &self.ttl)
            .field("single_flight", &self.single_flight)
            .finish()
    }
}

impl<K, V, F, Fut, E> Memoizer<K, V, F>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<V, E>>,
{
    /// At most `capacity` results, each valid for `ttl`
    pub fn new(capacity: usize, ttl: Duration, compute: F) -> Self {
        Self {
            compute,
            store: Mutex::new(BoundedLruStore::new(capacity)),
            ttl,
            inflight: Mutex::new(HashMap::new()),
            single_flight: true,
        }
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// Cached value for `key`, computing it on a miss.
    ///
    /// Errors from the compute function are returned and not cached.
    pub async fn get_or_compute(&self, key: K) -> Result<V, E> {
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }
        if !self.single_flight {
            return self.compute_and_store(key).await;
        }

        let gate = {
            let mut inflight = self.inflight.lock();
            Arc::clone(
                inflight
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        let guard = GateGuard {
            inflight: &self.inflight,
            key: key.clone(),
            gate,
        };

        let _permit = guard.gate.lock().await;
        // a caller ahead of us may have stored it while we waited
        match self.lookup(&key) {
            Some(value) => Ok(value),
            None => self.compute_and_store(key).await,
        }
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let mut store = self.store.lock();
        let valid = store
            .peek(key)
            .map(|entry| entry.is_valid_at(Instant::now(), None))?;
        if valid {
            store.get(key).map(|entry| entry.value)
        } else {
            store.remove(key);
            trace!("memoized value expired: {:?}", key);
            None
        }
    }

    async fn compute_and_store(&self, key: K) -> Result<V, E> {
        let value = (self.compute)(key.clone()).await?;
        let entry = TimedEntry::with_ttl(value.clone(), self.ttl);
        if let Err(e) = self.store.lock().put(key, entry) {
            debug!("memoized value not stored: {}", e);
        }
        Ok(value)
    }

    /// Forget one key
    pub fn invalidate(&self, key: &K) -> bool {
        self.store.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.store.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }
}
