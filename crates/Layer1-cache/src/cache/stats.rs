//! Hit/miss counters and the cross-tier statistics snapshot

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared by every tier of one coordinator.
///
/// Tiers bump them while holding their own lock, so a reader holding all
/// tier locks sees counts consistent with the tier contents.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// Consistent snapshot of all tiers
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub file_content_cache_size: usize,
    pub search_cache_size: usize,
    pub computed_cache_size: usize,
    pub tree_cache_size: usize,
    /// Current weight of the file content tier
    pub file_content_weight: usize,
    /// Bytes of text held by the file content tier
    pub file_content_bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    /// `hits / (hits + misses)`, 0 when nothing was looked up
    pub fn compute_hit_rate(hits: u64, misses: u64) -> f64 {
        let total = hits + misses;
        if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        }
    }

    /// Entries across all tiers
    pub fn total_entries(&self) -> usize {
        self.file_content_cache_size
            + self.search_cache_size
            + self.computed_cache_size
            + self.tree_cache_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::compute_hit_rate(0, 0), 0.0);
        assert!((CacheStats::compute_hit_rate(2, 1) - 0.666).abs() < 0.01);
        assert_eq!(CacheStats::compute_hit_rate(3, 0), 1.0);
    }

    #[test]
    fn test_counters_reset() {
        let counters = CacheCounters::new();
        counters.record_hit();
        counters.record_miss();
        counters.record_miss();
        assert_eq!((counters.hits(), counters.misses()), (1, 2));

        counters.reset();
        assert_eq!((counters.hits(), counters.misses()), (0, 0));
    }
}
