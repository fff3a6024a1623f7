//! Memory pressure reaction
//!
//! The host reports pressure levels; at or above the configured threshold
//! the coordinator is trimmed.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::coordinator::{CacheCoordinator, TrimReport};

/// Memory pressure reported by the host runtime, in increasing severity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PressureLevel {
    #[default]
    Normal,
    Low,
    Moderate,
    High,
    Critical,
}

impl fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "normal",
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Trims a coordinator when reported pressure reaches a threshold
pub struct MemoryPressureMonitor {
    coordinator: Arc<CacheCoordinator>,
    trim_at: PressureLevel,
    trims: AtomicU64,
    last_level: Mutex<PressureLevel>,
}

impl MemoryPressureMonitor {
    /// Monitor using the coordinator's configured threshold
    pub fn new(coordinator: Arc<CacheCoordinator>) -> Self {
        let trim_at = coordinator.config().pressure.trim_at;
        Self::with_threshold(coordinator, trim_at)
    }

    pub fn with_threshold(coordinator: Arc<CacheCoordinator>, trim_at: PressureLevel) -> Self {
        Self {
            coordinator,
            trim_at,
            trims: AtomicU64::new(0),
            last_level: Mutex::new(PressureLevel::Normal),
        }
    }

    /// Handle one report; returns what was trimmed, if anything
    pub fn on_pressure(&self, level: PressureLevel) -> Option<TrimReport> {
        *self.last_level.lock() = level;

        if level < self.trim_at {
            debug!("memory pressure {} below trim threshold {}", level, self.trim_at);
            return None;
        }

        let report = self.coordinator.trim_all();
        self.trims.fetch_add(1, Ordering::Relaxed);
        info!(
            "memory pressure {}: trimmed {} expired and {} file entries",
            level, report.expired, report.evicted
        );
        Some(report)
    }

    /// Consume reports from `rx` until every sender is dropped
    pub fn listen(self: Arc<Self>, mut rx: mpsc::Receiver<PressureLevel>) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(level) = rx.recv().await {
                self.on_pressure(level);
            }
            debug!("memory pressure channel closed");
        })
    }

    /// Number of trims performed
    pub fn trims(&self) -> u64 {
        self.trims.load(Ordering::Relaxed)
    }

    pub fn last_level(&self) -> PressureLevel {
        *self.last_level.lock()
    }

    pub fn threshold(&self) -> PressureLevel {
        self.trim_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fs::fake::FakeFileSystem;
    use crate::config::CacheConfig;
    use std::path::Path;

    async fn filled_coordinator(files: usize) -> Arc<CacheCoordinator> {
        let fs = Arc::new(FakeFileSystem::new());
        let mut config = CacheConfig::default();
        config.file_content.capacity = 10;
        config.sweep.enabled = false;
        let cache = CacheCoordinator::new(config, fs.clone()).unwrap();
        for i in 0..files {
            let path = format!("/p/{}.rs", i);
            fs.write(&path, "x", 1);
            cache.get_file_content(Path::new(&path)).await.unwrap();
        }
        cache
    }

    #[test]
    fn test_level_ordering() {
        assert!(PressureLevel::Normal < PressureLevel::Low);
        assert!(PressureLevel::Moderate < PressureLevel::High);
        assert!(PressureLevel::High < PressureLevel::Critical);
        assert_eq!(PressureLevel::default(), PressureLevel::Normal);
        assert_eq!(
            serde_json::to_string(&PressureLevel::Critical).unwrap(),
            "\"critical\""
        );
    }

    #[tokio::test]
    async fn test_trims_at_high_and_above() {
        let cache = filled_coordinator(10).await;
        let monitor = MemoryPressureMonitor::new(Arc::clone(&cache));
        assert_eq!(monitor.threshold(), PressureLevel::High);

        assert!(monitor.on_pressure(PressureLevel::Moderate).is_none());
        assert_eq!(cache.stats().file_content_cache_size, 10);

        let report = monitor.on_pressure(PressureLevel::High).unwrap();
        assert_eq!(report.evicted, 5);
        assert_eq!(cache.stats().file_content_cache_size, 5);

        // already at the watermark
        let report = monitor.on_pressure(PressureLevel::Critical).unwrap();
        assert_eq!(report.evicted, 0);
        assert_eq!(monitor.trims(), 2);
        assert_eq!(monitor.last_level(), PressureLevel::Critical);
    }

    #[tokio::test]
    async fn test_listen_consumes_channel() {
        let cache = filled_coordinator(8).await;
        let monitor = Arc::new(MemoryPressureMonitor::with_threshold(
            Arc::clone(&cache),
            PressureLevel::Moderate,
        ));

        let (tx, rx) = mpsc::channel(4);
        let handle = Arc::clone(&monitor).listen(rx);
        tx.send(PressureLevel::Low).await.unwrap();
        tx.send(PressureLevel::Moderate).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(monitor.trims(), 1);
        assert_eq!(monitor.last_level(), PressureLevel::Moderate);
        assert_eq!(cache.stats().file_content_cache_size, 5);
    }
}
