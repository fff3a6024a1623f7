//! File content tier
//!
//! Entries are valid while the file keeps the `(mtime, size)` recorded when
//! it was loaded. The signature is taken before the read, so a write racing
//! with the load can leave a stale entry until the next signature change;
//! that window is accepted.

use parking_lot::{Mutex, MutexGuard};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::entry::TimedEntry;
use super::fs::{is_within, normalize_key, FileSystem};
use super::lru::{BoundedLruStore, EvictionCause};
use super::stats::CacheCounters;
use crate::config::{FileContentConfig, WeighBy};
use crate::Result;

pub(crate) type FileStore = BoundedLruStore<PathBuf, TimedEntry<String>>;

/// LRU-bounded cache of small-to-medium text files
pub struct FileContentCache {
    store: Mutex<FileStore>,
    fs: Arc<dyn FileSystem>,
    max_file_size: usize,
    counters: Arc<CacheCounters>,
}

impl FileContentCache {
    pub fn new(
        config: &FileContentConfig,
        fs: Arc<dyn FileSystem>,
        counters: Arc<CacheCounters>,
    ) -> Self {
        let store: FileStore = match config.weigh_by {
            WeighBy::Entries => BoundedLruStore::new(config.capacity),
            WeighBy::Bytes => {
                BoundedLruStore::with_weigher(config.capacity, |_, e: &TimedEntry<String>| {
                    e.value.len()
                })
            }
        };
        let store = store.with_eviction_listener(|path, _, cause: EvictionCause| {
            trace!("file cache evicted {} ({:?})", path.display(), cause);
        });

        Self {
            store: Mutex::new(store),
            fs,
            max_file_size: config.max_file_size,
            counters,
        }
    }

    /// Return the cached content of `path` if its signature still matches,
    /// otherwise call `loader` and cache what it returns.
    ///
    /// Loader errors are returned as-is and leave no entry behind. Content
    /// longer than the admission ceiling is returned but not stored.
    pub async fn get_or_load<F, Fut>(&self, path: &Path, loader: F) -> Result<String>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = io::Result<String>>,
    {
        let key = normalize_key(path);
        // a failed stat is a miss; the loader reports the real error
        let observed = self.fs.stat(&key).await.ok();

        {
            let mut store = self.store.lock();
            let valid = store
                .peek(&key)
                .map(|entry| entry.is_valid_at(Instant::now(), observed.as_ref()));
            match valid {
                Some(true) => {
                    if let Some(entry) = store.get(&key) {
                        self.counters.record_hit();
                        trace!("file cache hit: {}", key.display());
                        return Ok(entry.value);
                    }
                }
                Some(false) => {
                    store.remove(&key);
                    trace!("file cache stale: {}", key.display());
                }
                None => {}
            }
            self.counters.record_miss();
        }

        let content = loader(key.clone()).await?;

        if content.len() > self.max_file_size {
            debug!(
                "not caching {} ({} bytes > {} byte ceiling)",
                key.display(),
                content.len(),
                self.max_file_size
            );
            return Ok(content);
        }

        if let Some(signature) = observed {
            let entry = TimedEntry::with_signature(content.clone(), signature);
            if let Err(e) = self.store.lock().put(key, entry) {
                debug!("file cache rejected entry: {}", e);
            }
        }
        Ok(content)
    }

    /// [`get_or_load`](Self::get_or_load) with the injected filesystem as loader
    pub async fn get(&self, path: &Path) -> Result<String> {
        let fs = Arc::clone(&self.fs);
        self.get_or_load(path, |key| async move { fs.read_text(&key).await })
            .await
    }

    /// Drop the entry of one file
    pub fn invalidate(&self, path: &Path) -> bool {
        self.store.lock().remove(&normalize_key(path)).is_some()
    }

    /// Drop every entry at or below `dir` (segment-boundary match)
    pub fn invalidate_prefix(&self, dir: &Path) -> usize {
        let dir = normalize_key(dir);
        self.store.lock().remove_if(|path, _| is_within(path, &dir))
    }

    /// Evict down to half of the configured capacity
    pub fn trim(&self) -> usize {
        trim_store(&mut self.store.lock())
    }

    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().is_empty()
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.store.lock().contains(&normalize_key(path))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, FileStore> {
        self.store.lock()
    }
}

/// Memory-pressure watermark: half the capacity weight
pub(crate) fn trim_store(store: &mut FileStore) -> usize {
    let watermark = store.capacity_weight() / 2;
    store.trim_to(watermark)
}

/// Bytes of text held by the store
pub(crate) fn content_bytes(store: &FileStore) -> usize {
    store.iter().map(|(_, entry)| entry.value.len()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fs::fake::FakeFileSystem;

    const FILE_CEILING: usize = 16;

    fn cache_with(fs: Arc<FakeFileSystem>, capacity: usize) -> FileContentCache {
        let config = FileContentConfig {
            capacity,
            ..Default::default()
        };
        FileContentCache::new(&config, fs, Arc::new(CacheCounters::new()))
    }

    #[tokio::test]
    async fn test_hit_when_signature_unchanged() {
        let fs = Arc::new(FakeFileSystem::new());
        fs.write("/a.txt", "v1", 100);
        let cache = cache_with(Arc::clone(&fs), 10);

        assert_eq!(cache.get(Path::new("/a.txt")).await.unwrap(), "v1");
        assert_eq!(cache.get(Path::new("/a.txt")).await.unwrap(), "v1");
        assert_eq!(fs.reads(), 1);
        assert_eq!(cache.counters.hits(), 1);
        assert_eq!(cache.counters.misses(), 1);
    }

    #[tokio::test]
    async fn test_reload_when_mtime_changes() {
        let fs = Arc::new(FakeFileSystem::new());
        fs.write("/a.txt", "v1", 100);
        let cache = cache_with(Arc::clone(&fs), 10);
        cache.get(Path::new("/a.txt")).await.unwrap();

        // same size, newer mtime
        fs.write("/a.txt", "v2", 200);
        assert_eq!(cache.get(Path::new("/a.txt")).await.unwrap(), "v2");
        assert_eq!(fs.reads(), 2);

        // the replacement entry is served afterwards
        assert_eq!(cache.get(Path::new("/a.txt")).await.unwrap(), "v2");
        assert_eq!(fs.reads(), 2);
    }

    #[tokio::test]
    async fn test_reload_when_size_changes() {
        let fs = Arc::new(FakeFileSystem::new());
        fs.write("/a.txt", "v1", 100);
        let cache = cache_with(Arc::clone(&fs), 10);
        cache.get(Path::new("/a.txt")).await.unwrap();

        fs.write("/a.txt", "v1 and more", 100);
        assert_eq!(cache.get(Path::new("/a.txt")).await.unwrap(), "v1 and more");
        assert_eq!(fs.reads(), 2);
    }

    #[tokio::test]
    async fn test_oversized_content_not_admitted() {
        let fs = Arc::new(FakeFileSystem::new());
        let big = "x".repeat(FILE_CEILING + 1);
        fs.write("/big.txt", &big, 1);
        let config = FileContentConfig {
            capacity: 10,
            max_file_size: FILE_CEILING,
            ..Default::default()
        };
        let cache = FileContentCache::new(&config, fs.clone(), Arc::new(CacheCounters::new()));

        assert_eq!(cache.get(Path::new("/big.txt")).await.unwrap().len(), big.len());
        assert!(!cache.contains(Path::new("/big.txt")));
        cache.get(Path::new("/big.txt")).await.unwrap();
        assert_eq!(fs.reads(), 2);
    }

    #[tokio::test]
    async fn test_loader_error_propagates_without_entry() {
        let fs = Arc::new(FakeFileSystem::new());
        fs.write("/a.txt", "v1", 100);
        let cache = cache_with(fs, 10);

        let err = cache
            .get_or_load(Path::new("/a.txt"), |_| async {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
            })
            .await
            .unwrap_err();
        assert!(err.is_io());
        assert!(!cache.contains(Path::new("/a.txt")));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let fs = Arc::new(FakeFileSystem::new());
        let cache = cache_with(fs, 10);
        assert!(cache.get(Path::new("/nope.txt")).await.unwrap_err().is_io());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_prefix_respects_segments() {
        let fs = Arc::new(FakeFileSystem::new());
        for path in ["/proj/foo/a.rs", "/proj/foo/sub/b.rs", "/proj/foobar/c.rs"] {
            fs.write(path, "x", 1);
        }
        let cache = cache_with(fs, 10);
        for path in ["/proj/foo/a.rs", "/proj/foo/sub/b.rs", "/proj/foobar/c.rs"] {
            cache.get(Path::new(path)).await.unwrap();
        }

        assert_eq!(cache.invalidate_prefix(Path::new("/proj/foo")), 2);
        assert!(cache.contains(Path::new("/proj/foobar/c.rs")));
        assert!(!cache.contains(Path::new("/proj/foo/a.rs")));
    }

    #[tokio::test]
    async fn test_capacity_keeps_most_recent() {
        let fs = Arc::new(FakeFileSystem::new());
        for i in 0..60 {
            fs.write(&format!("/f{}.txt", i), "x", 1);
        }
        let cache = cache_with(fs, 50);
        for i in 0..60 {
            cache.get(Path::new(&format!("/f{}.txt", i))).await.unwrap();
        }

        assert_eq!(cache.len(), 50);
        assert!(!cache.contains(Path::new("/f9.txt")));
        assert!(cache.contains(Path::new("/f10.txt")));
        assert!(cache.contains(Path::new("/f59.txt")));

        assert_eq!(cache.trim(), 25);
        assert_eq!(cache.trim(), 0);
        assert!(cache.contains(Path::new("/f59.txt")));
        assert!(!cache.contains(Path::new("/f34.txt")));
    }
}
