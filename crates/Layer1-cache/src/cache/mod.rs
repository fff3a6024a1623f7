//! # Cache Tiers
//!
//! Four in-memory tiers behind one coordinator:
//!
//! | Tier | Store | Validity |
//! |------|-------|----------|
//! | File content | [`BoundedLruStore`] | file `(mtime, size)` unchanged |
//! | Search results | [`TimedCache`] | TTL (60s) |
//! | Computed values | [`TimedCache`] | TTL (caller-chosen, 5 min default) |
//! | Directory trees | [`TimedCache`] | TTL (5 min) |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ide_cache::cache::{CacheCoordinator, FileChange, LocalFileSystem};
//! use ide_cache::config::CacheConfig;
//!
//! let cache = CacheCoordinator::new(CacheConfig::default(), Arc::new(LocalFileSystem))?;
//!
//! let text = cache.get_file_content(path).await?;
//! let tree = cache.tree_with(project, || scanner.scan(project)).await;
//!
//! // from the file watcher
//! cache.on_file_changed(FileChange::Deleted(path.to_path_buf()));
//! ```
//!
//! ## Modules
//!
//! - [`entry`] - Entry validity (TTL, file signature, external check)
//! - [`lru`] - Weight-bounded LRU store
//! - [`file_content`] - File content tier
//! - [`timed`] - TTL tiers
//! - [`coordinator`] - Tier owner, stats, trimming, background sweep
//! - [`pressure`] - Memory pressure reaction
//! - [`fs`] - Filesystem capability
//! - [`hash`] - Cache key hashing

pub mod coordinator;
pub mod entry;
pub mod file_content;
pub mod fs;
pub mod hash;
pub mod lru;
pub mod pressure;
pub mod stats;
pub mod timed;
pub mod types;

pub use coordinator::{CacheCoordinator, FileChange, TrimReport};
pub use entry::{ExternalCheck, TimedEntry, ValidityRule};
pub use file_content::FileContentCache;
pub use fs::{FileSignature, FileSystem, LocalFileSystem};
pub use hash::{compute_hash, computed_key, hash_json, search_fingerprint};
pub use lru::{BoundedLruStore, EvictionCause};
pub use pressure::{MemoryPressureMonitor, PressureLevel};
pub use stats::{CacheCounters, CacheStats};
pub use timed::TimedCache;
pub use types::{FileTreeNode, SearchKey, SearchResult};
