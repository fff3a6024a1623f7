//! TTL tiers (search results, computed values, directory trees)
//!
//! Unbounded maps: growth is kept in check by lazy expiry on `get` plus
//! the coordinator's periodic sweep, both using the same validity
//! predicate from [`TimedEntry`].

use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

use super::entry::TimedEntry;
use super::stats::CacheCounters;

pub(crate) type TimedMap<K, V> = HashMap<K, TimedEntry<V>>;

/// A keyed TTL cache
pub struct TimedCache<K, V> {
    name: &'static str,
    map: Mutex<TimedMap<K, V>>,
    default_ttl: Duration,
    counters: Arc<CacheCounters>,
}

impl<K, V> fmt::Debug for TimedCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedCache")
            .field("name", &self.name)
            .field("len", &self.map.lock().len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl<K, V> TimedCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    pub fn new(name: &'static str, default_ttl: Duration, counters: Arc<CacheCounters>) -> Self {
        Self {
            name,
            map: Mutex::new(HashMap::new()),
            default_ttl,
            counters,
        }
    }

    /// Get a copy of a live value; an expired entry is removed and counts
    /// as a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_map(key, |value| Some(value.clone()))
    }

    /// Read a live value through `read`. The lookup counts as a hit only
    /// when `read` returns `Some`.
    pub fn get_map<R, F>(&self, key: &K, read: F) -> Option<R>
    where
        F: FnOnce(&V) -> Option<R>,
    {
        let mut map = self.map.lock();
        let now = Instant::now();
        match map.get(key) {
            Some(entry) if entry.is_valid_at(now, None) => match read(&entry.value) {
                Some(out) => {
                    self.counters.record_hit();
                    trace!("{} cache hit: {:?}", self.name, key);
                    Some(out)
                }
                None => {
                    self.counters.record_miss();
                    None
                }
            },
            Some(_) => {
                map.remove(key);
                self.counters.record_miss();
                trace!("{} cache expired: {:?}", self.name, key);
                None
            }
            None => {
                self.counters.record_miss();
                None
            }
        }
    }

    /// Insert with the tier's default TTL
    pub fn put(&self, key: K, value: V) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    /// Insert with an explicit TTL (last write wins)
    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.map.lock().insert(key, TimedEntry::with_ttl(value, ttl));
    }

    pub fn invalidate(&self, key: &K) -> bool {
        self.map.lock().remove(key).is_some()
    }

    /// Remove every entry whose key matches
    pub fn invalidate_matching<F>(&self, predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        invalidate_matching(&mut self.map.lock(), predicate)
    }

    /// Remove entries whose TTL has elapsed
    pub fn purge_expired(&self) -> usize {
        purge_expired(&mut self.map.lock(), Instant::now())
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    pub fn clear(&self) {
        self.map.lock().clear();
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, TimedMap<K, V>> {
        self.map.lock()
    }
}

pub(crate) fn invalidate_matching<K, V, F>(map: &mut TimedMap<K, V>, mut predicate: F) -> usize
where
    F: FnMut(&K) -> bool,
{
    let before = map.len();
    map.retain(|k, _| !predicate(k));
    before - map.len()
}

pub(crate) fn purge_expired<K, V>(map: &mut TimedMap<K, V>, now: Instant) -> usize {
    let before = map.len();
    map.retain(|_, entry| !entry.is_expired_at(now));
    before - map.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(ttl_ms: u64) -> TimedCache<String, u32> {
        TimedCache::new(
            "test",
            Duration::from_millis(ttl_ms),
            Arc::new(CacheCounters::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_on_get() {
        let cache = cache(100);
        cache.put("k".to_string(), 1);

        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(cache.get(&"k".to_string()), Some(1));

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(cache.get(&"k".to_string()), None);
        assert!(cache.is_empty());
        assert_eq!(cache.counters.hits(), 1);
        assert_eq!(cache.counters.misses(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired_without_get() {
        let cache = cache(100);
        cache.put("short".to_string(), 1);
        cache.put_with_ttl("long".to_string(), 2, Duration::from_secs(10));

        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.purge_expired(), 0);
        // sweeping does not touch the counters
        assert_eq!(cache.counters.hits() + cache.counters.misses(), 0);
    }

    #[test]
    fn test_invalidate_matching() {
        let cache = cache(60_000);
        cache.put("outline:/a.rs".to_string(), 1);
        cache.put("outline:/b.rs".to_string(), 2);
        cache.put("symbols:/a.rs".to_string(), 3);

        assert_eq!(cache.invalidate_matching(|k| k.contains("/a.rs")), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.invalidate(&"outline:/b.rs".to_string()));
        assert!(!cache.invalidate(&"outline:/b.rs".to_string()));
    }

    #[test]
    fn test_put_overwrites() {
        let cache = cache(60_000);
        cache.put("k".to_string(), 1);
        cache.put("k".to_string(), 2);
        assert_eq!(cache.get(&"k".to_string()), Some(2));
        assert_eq!(cache.len(), 1);
    }
}
