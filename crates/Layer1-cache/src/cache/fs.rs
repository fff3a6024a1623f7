//! Filesystem capability consumed by the file content tier
//!
//! The cache never touches the disk directly; it goes through
//! [`FileSystem`] so hosts (and tests) can substitute their own view.

use async_trait::async_trait;
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// `(mtime, size)` of a file at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FileSignature {
    pub mtime: SystemTime,
    pub size: u64,
}

impl FileSignature {
    pub fn new(mtime: SystemTime, size: u64) -> Self {
        Self { mtime, size }
    }
}

/// Read access to files
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Read a whole file as UTF-8 text
    async fn read_text(&self, path: &Path) -> io::Result<String>;

    /// Current signature of a file
    async fn stat(&self, path: &Path) -> io::Result<FileSignature>;
}

/// [`FileSystem`] backed by `tokio::fs`
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn read_text(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn stat(&self, path: &Path) -> io::Result<FileSignature> {
        let meta = tokio::fs::metadata(path).await?;
        Ok(FileSignature::new(meta.modified()?, meta.len()))
    }
}

/// `path` equals `dir` or lies below it, compared component by component,
/// so `/proj/foo` does not contain `/proj/foobar`.
pub fn is_within(path: &Path, dir: &Path) -> bool {
    path.starts_with(dir)
}

/// Turn a possibly relative path into the absolute cache key
pub fn normalize_key(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory filesystem with controllable signatures

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, UNIX_EPOCH};

    #[derive(Default)]
    pub struct FakeFileSystem {
        files: Mutex<HashMap<PathBuf, (String, FileSignature)>>,
        reads: AtomicUsize,
    }

    impl FakeFileSystem {
        pub fn new() -> Self {
            Self::default()
        }

        /// Write a file with an explicit mtime (seconds since epoch)
        pub fn write(&self, path: &str, content: &str, mtime_secs: u64) {
            let sig = FileSignature::new(
                UNIX_EPOCH + Duration::from_secs(mtime_secs),
                content.len() as u64,
            );
            self.files
                .lock()
                .insert(PathBuf::from(path), (content.to_string(), sig));
        }

        pub fn delete(&self, path: &str) {
            self.files.lock().remove(Path::new(path));
        }

        pub fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FileSystem for FakeFileSystem {
        async fn read_text(&self, path: &Path) -> io::Result<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.files
                .lock()
                .get(path)
                .map(|(content, _)| content.clone())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
        }

        async fn stat(&self, path: &Path) -> io::Result<FileSignature> {
            self.files
                .lock()
                .get(path)
                .map(|(_, sig)| *sig)
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_within_segment_boundary() {
        assert!(is_within(Path::new("/proj/foo/a.rs"), Path::new("/proj/foo")));
        assert!(is_within(Path::new("/proj/foo"), Path::new("/proj/foo")));
        assert!(is_within(Path::new("/proj/foo/a.rs"), Path::new("/proj/foo/")));
        assert!(!is_within(Path::new("/proj/foobar/a.rs"), Path::new("/proj/foo")));
        assert!(!is_within(Path::new("/proj"), Path::new("/proj/foo")));
    }

    #[tokio::test]
    async fn test_local_file_system() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, "hello").unwrap();

        let fs = LocalFileSystem;
        assert_eq!(fs.read_text(&path).await.unwrap(), "hello");
        assert_eq!(fs.stat(&path).await.unwrap().size, 5);

        let missing = dir.path().join("missing.txt");
        let err = fs.read_text(&missing).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
