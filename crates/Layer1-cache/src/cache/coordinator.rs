//! Cache Coordinator
//!
//! Owns the four tiers, the shared hit/miss counters and the background
//! sweep task.
//!
//! # Lock order
//!
//! Single-tier operations take only that tier's lock. Operations that need
//! a consistent cross-tier view (`stats`, `clear_all`, `trim_all`) take all
//! tier locks through `lock_all`, always in the order
//! file content -> search -> computed -> tree. No other code path holds two
//! tier locks at once.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                   CacheCoordinator                      │
//! ├─────────────────────────────────────────────────────────┤
//! │  A  FileContentCache   (LRU, (mtime,size) validity)     │
//! │  B  search             (TTL, keyed by project+query)    │
//! │  C  computed           (TTL, opaque string keys)        │
//! │  D  trees              (TTL, one per project)           │
//! ├─────────────────────────────────────────────────────────┤
//! │  sweep task (interval) ──► sweep_expired()  [B, C, D]   │
//! │  memory pressure       ──► trim_all()       [A..D]      │
//! └─────────────────────────────────────────────────────────┘
//! ```

use parking_lot::{Mutex, MutexGuard};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::file_content::{content_bytes, trim_store, FileContentCache, FileStore};
use super::fs::{is_within, normalize_key, FileSystem};
use super::stats::{CacheCounters, CacheStats};
use super::timed::{self, TimedCache, TimedMap};
use super::types::{FileTreeNode, SearchKey, SearchResult};
use crate::config::CacheConfig;
use crate::{Error, Result};

/// A change reported by the file watcher or the editor save path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

/// What a `trim_all` call removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrimReport {
    /// TTL-expired entries dropped from the search/computed/tree tiers
    pub expired: usize,
    /// File content entries evicted down to the pressure watermark
    pub evicted: usize,
}

/// All tier guards, acquired in the fixed global order
pub(crate) struct TierGuards<'a> {
    pub files: MutexGuard<'a, FileStore>,
    pub search: MutexGuard<'a, TimedMap<SearchKey, Vec<SearchResult>>>,
    pub computed: MutexGuard<'a, TimedMap<String, Value>>,
    pub trees: MutexGuard<'a, TimedMap<PathBuf, FileTreeNode>>,
}

struct SweepTask {
    handle: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

/// Resets the in-flight flag even if the sweep panics
struct SweepGuard<'a>(&'a AtomicBool);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The cache façade shared (via `Arc`) by every collaborator.
///
/// # Usage
///
/// ```rust,ignore
/// let cache = CacheCoordinator::new(CacheConfig::default(), Arc::new(LocalFileSystem))?;
///
/// let text = cache.get_file_content(Path::new("/proj/src/main.rs")).await?;
///
/// if cache.get_search_results(project, "TODO").is_none() {
///     let results = engine.search(project, "TODO").await;
///     cache.put_search_results(project, "TODO", results);
/// }
///
/// cache.on_file_changed(FileChange::Modified(path));
/// cache.shutdown().await;
/// ```
pub struct CacheCoordinator {
    config: CacheConfig,

    files: FileContentCache,
    search: TimedCache<SearchKey, Vec<SearchResult>>,
    computed: TimedCache<String, Value>,
    trees: TimedCache<PathBuf, FileTreeNode>,

    counters: Arc<CacheCounters>,
    sweep_in_flight: AtomicBool,
    sweep_task: Mutex<Option<SweepTask>>,
}

impl CacheCoordinator {
    /// Build the coordinator and start its sweep task (when enabled).
    ///
    /// Must be called inside a tokio runtime if the sweep is enabled.
    pub fn new(config: CacheConfig, fs: Arc<dyn FileSystem>) -> Result<Arc<Self>> {
        config.validate()?;

        let counters = Arc::new(CacheCounters::new());
        let coordinator = Arc::new(Self {
            files: FileContentCache::new(&config.file_content, fs, Arc::clone(&counters)),
            search: TimedCache::new("search", config.ttl.search_ttl(), Arc::clone(&counters)),
            computed: TimedCache::new(
                "computed",
                config.ttl.computed_ttl(),
                Arc::clone(&counters),
            ),
            trees: TimedCache::new("tree", config.ttl.tree_ttl(), Arc::clone(&counters)),
            counters,
            sweep_in_flight: AtomicBool::new(false),
            sweep_task: Mutex::new(None),
            config,
        });

        if let Some(interval) = coordinator.config.sweep.interval() {
            let runtime = tokio::runtime::Handle::try_current()
                .map_err(|e| Error::Runtime(e.to_string()))?;
            let task = Self::spawn_sweep(&runtime, Arc::downgrade(&coordinator), interval);
            *coordinator.sweep_task.lock() = Some(task);
        }

        info!(
            "cache coordinator started (file capacity {}, sweep {:?})",
            coordinator.config.file_content.capacity,
            coordinator.config.sweep.interval()
        );
        Ok(coordinator)
    }

    fn spawn_sweep(
        runtime: &tokio::runtime::Handle,
        coordinator: Weak<Self>,
        interval: Duration,
    ) -> SweepTask {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // the task never keeps the coordinator alive
                        let Some(strong) = coordinator.upgrade() else {
                            break;
                        };
                        let removed = strong.sweep_expired();
                        if removed > 0 {
                            debug!("cache sweep removed {} expired entries", removed);
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("cache sweep task stopped");
        });

        SweepTask { handle, shutdown }
    }

    /// Stop the sweep task and wait for it. Safe to call more than once.
    pub async fn shutdown(&self) {
        let task = self.sweep_task.lock().take();
        if let Some(task) = task {
            let _ = task.shutdown.send(true);
            if let Err(e) = task.handle.await {
                if e.is_panic() {
                    warn!("cache sweep task panicked: {}", e);
                }
            }
            info!("cache coordinator shut down");
        }
    }

    /// Whether the background sweep is running
    pub fn is_sweeping(&self) -> bool {
        self.sweep_task
            .lock()
            .as_ref()
            .map(|task| !task.handle.is_finished())
            .unwrap_or(false)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Take every tier lock in the global order
    pub(crate) fn lock_all(&self) -> TierGuards<'_> {
        let files = self.files.lock();
        let search = self.search.lock();
        let computed = self.computed.lock();
        let trees = self.trees.lock();
        TierGuards {
            files,
            search,
            computed,
            trees,
        }
    }

    // =========================================================================
    // File content
    // =========================================================================

    /// Content of `path`, served from cache while its `(mtime, size)` holds
    pub async fn get_file_content(&self, path: &Path) -> Result<String> {
        self.files.get(path).await
    }

    /// Same as [`get_file_content`](Self::get_file_content) with a caller-supplied loader
    pub async fn get_file_content_with<F, Fut>(&self, path: &Path, loader: F) -> Result<String>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = std::io::Result<String>>,
    {
        self.files.get_or_load(path, loader).await
    }

    pub fn invalidate_file(&self, path: &Path) -> bool {
        let removed = self.files.invalidate(path);
        if removed {
            trace!("invalidated file {}", path.display());
        }
        removed
    }

    /// Drop cached content of every file at or below `dir`
    pub fn invalidate_directory(&self, dir: &Path) -> usize {
        let removed = self.files.invalidate_prefix(dir);
        debug!("invalidated {} files under {}", removed, dir.display());
        removed
    }

    // =========================================================================
    // Search results
    // =========================================================================

    pub fn get_search_results(&self, project: &Path, query: &str) -> Option<Vec<SearchResult>> {
        self.search.get(&SearchKey::new(project, query))
    }

    pub fn put_search_results(&self, project: &Path, query: &str, results: Vec<SearchResult>) {
        self.search.put(SearchKey::new(project, query), results);
    }

    /// Cached results, or run `search` on a miss and cache its output
    pub async fn search_with<F, Fut>(&self, project: &Path, query: &str, search: F) -> Vec<SearchResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Vec<SearchResult>>,
    {
        if let Some(results) = self.get_search_results(project, query) {
            return results;
        }
        let results = search().await;
        self.put_search_results(project, query, results.clone());
        results
    }

    /// Drop every cached search of `project`
    pub fn invalidate_search(&self, project: &Path) -> usize {
        let project = normalize_key(project);
        self.search.invalidate_matching(|key| key.project == project)
    }

    // =========================================================================
    // Computed values
    // =========================================================================

    /// A computed value, decoded into `T`.
    ///
    /// A value stored under a different type decodes to `None` and is
    /// logged; it is never cast unchecked.
    pub fn get_computed<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.computed.get_map(&key.to_string(), |value| {
            match serde_json::from_value(value.clone()) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    warn!("computed value {} has an unexpected shape: {}", key, e);
                    None
                }
            }
        })
    }

    /// Store a computed value; `ttl = None` uses the configured default
    pub fn put_computed<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let ttl = ttl.unwrap_or_else(|| self.computed.default_ttl());
        self.computed.put_with_ttl(key.to_string(), value, ttl);
        Ok(())
    }

    /// Drop every computed value whose key contains `pattern`
    pub fn invalidate_computed(&self, pattern: &str) -> usize {
        self.computed.invalidate_matching(|key| key.contains(pattern))
    }

    // =========================================================================
    // Directory trees
    // =========================================================================

    pub fn get_tree(&self, project: &Path) -> Option<FileTreeNode> {
        self.trees.get(&normalize_key(project))
    }

    pub fn put_tree(&self, project: &Path, tree: FileTreeNode) {
        self.trees.put(normalize_key(project), tree);
    }

    /// Cached tree, or run `scan` on a miss and cache its output
    pub async fn tree_with<F, Fut>(&self, project: &Path, scan: F) -> FileTreeNode
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FileTreeNode>,
    {
        if let Some(tree) = self.get_tree(project) {
            return tree;
        }
        let tree = scan().await;
        self.put_tree(project, tree.clone());
        tree
    }

    pub fn invalidate_tree(&self, project: &Path) -> bool {
        self.trees.invalidate(&normalize_key(project))
    }

    // =========================================================================
    // Invalidation from the file watcher
    // =========================================================================

    /// React to a file change.
    ///
    /// Content changes drop the file entry. Structural changes (create,
    /// delete, rename) also drop the trees and search results of every
    /// project containing the path.
    pub fn on_file_changed(&self, change: FileChange) {
        match change {
            FileChange::Modified(path) => {
                self.invalidate_file(&path);
                self.invalidate_projects_containing(&path, false);
            }
            FileChange::Created(path) | FileChange::Deleted(path) => {
                self.invalidate_file(&path);
                self.invalidate_directory(&path);
                self.invalidate_projects_containing(&path, true);
            }
            FileChange::Renamed { from, to } => {
                for path in [from, to] {
                    self.invalidate_file(&path);
                    self.invalidate_directory(&path);
                    self.invalidate_projects_containing(&path, true);
                }
            }
        }
    }

    fn invalidate_projects_containing(&self, path: &Path, structural: bool) {
        let path = normalize_key(path);
        let searches = self
            .search
            .invalidate_matching(|key| is_within(&path, &key.project));
        let trees = if structural {
            self.trees.invalidate_matching(|project| is_within(&path, project))
        } else {
            0
        };
        if searches + trees > 0 {
            debug!(
                "{} changed: dropped {} searches, {} trees",
                path.display(),
                searches,
                trees
            );
        }
    }

    // =========================================================================
    // Global operations
    // =========================================================================

    /// Consistent snapshot of all tiers and counters
    pub fn stats(&self) -> CacheStats {
        let guards = self.lock_all();
        let hits = self.counters.hits();
        let misses = self.counters.misses();
        CacheStats {
            file_content_cache_size: guards.files.len(),
            search_cache_size: guards.search.len(),
            computed_cache_size: guards.computed.len(),
            tree_cache_size: guards.trees.len(),
            file_content_weight: guards.files.current_weight(),
            file_content_bytes: content_bytes(&guards.files),
            hits,
            misses,
            hit_rate: CacheStats::compute_hit_rate(hits, misses),
        }
    }

    /// Reset every tier and both counters
    pub fn clear_all(&self) {
        let mut guards = self.lock_all();
        guards.files.clear();
        guards.search.clear();
        guards.computed.clear();
        guards.trees.clear();
        self.counters.reset();
        debug!("all cache tiers cleared");
    }

    /// Memory-pressure response: drop expired TTL entries and evict the
    /// file content tier down to half its capacity. Idempotent.
    pub fn trim_all(&self) -> TrimReport {
        let now = Instant::now();
        let mut guards = self.lock_all();
        let evicted = trim_store(&mut guards.files);
        let expired = timed::purge_expired(&mut guards.search, now)
            + timed::purge_expired(&mut guards.computed, now)
            + timed::purge_expired(&mut guards.trees, now);
        drop(guards);

        let report = TrimReport { expired, evicted };
        if expired + evicted > 0 {
            info!(
                "cache trimmed: {} expired, {} file entries evicted",
                expired, evicted
            );
        }
        report
    }

    /// Expiry-only sweep of the TTL tiers (what the background task runs).
    ///
    /// Returns 0 without doing anything if another sweep is in flight.
    pub fn sweep_expired(&self) -> usize {
        if self
            .sweep_in_flight
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            trace!("cache sweep already in flight, skipping");
            return 0;
        }
        let _guard = SweepGuard(&self.sweep_in_flight);

        self.search.purge_expired() + self.computed.purge_expired() + self.trees.purge_expired()
    }
}

impl std::fmt::Debug for CacheCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheCoordinator")
            .field("config", &self.config)
            .field("search", &self.search)
            .field("computed", &self.computed)
            .field("trees", &self.trees)
            .finish()
    }
}
