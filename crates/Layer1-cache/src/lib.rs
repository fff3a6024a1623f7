//! # ide-cache
//!
//! Caching and concurrency-coordination core for an IDE support layer:
//! - Cache: file content / search results / computed values / directory trees
//! - Schedule: debounce, throttle, coalesce
//! - Compute: memoize, paginate, chunked processing
//! - Config: `CacheConfig` (JSON / TOML)
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  editor / search view / file tree    (callers)          │
//! │                     │                                   │
//! │                     ▼                                   │
//! │            CacheCoordinator  ◄── file watcher           │
//! │   ┌──────────┬──────────┬──────────┬──────────┐         │
//! │   │  files   │  search  │ computed │  trees   │         │
//! │   │  (LRU)   │  (TTL)   │  (TTL)   │  (TTL)   │         │
//! │   └──────────┴──────────┴──────────┴──────────┘         │
//! │          ▲                          ▲                   │
//! │   sweep task (interval)     MemoryPressureMonitor       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The crate logs through `tracing` and never installs a subscriber.

pub mod cache;
pub mod compute;
pub mod config;
pub mod error;
pub mod schedule;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    CacheConfig, FileContentConfig, PressureConfig, SweepConfig, TtlConfig, WeighBy,
    FILE_CONTENT_MAX_SIZE,
};

// ============================================================================
// Cache
// ============================================================================
pub use cache::{
    // Coordinator (coordinator.rs)
    CacheCoordinator,
    CacheStats,
    FileChange,
    TrimReport,
    // Memory pressure (pressure.rs)
    MemoryPressureMonitor,
    PressureLevel,
    // Filesystem capability (fs.rs)
    FileSignature,
    FileSystem,
    LocalFileSystem,
    // Stored values (types.rs)
    FileTreeNode,
    SearchResult,
    // Building blocks
    BoundedLruStore,
    EvictionCause,
    TimedEntry,
    ValidityRule,
};

// ============================================================================
// Schedule / Compute
// ============================================================================
pub use compute::{ChunkedProcessor, LazyPaginator, Memoizer, PageState};
pub use schedule::{Debouncer, Throttler, UpdateCoalescer};
