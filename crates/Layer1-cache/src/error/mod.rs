//! Error types for the cache core
//!
//! A cache miss is never an error (`Option::None`). Loader failures are
//! propagated verbatim and never cached.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Cache core error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Cache admission
    // ========================================================================
    /// Entry heavier than the whole store; the caller still gets its value,
    /// it just bypasses the cache.
    #[error("Entry too large: weight {weight} exceeds capacity {capacity}")]
    EntryTooLarge { weight: usize, capacity: usize },

    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Runtime / scheduling
    // ========================================================================
    #[error("Async runtime unavailable: {0}")]
    Runtime(String),

    // ========================================================================
    // External error conversion
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Soft rejections: the operation succeeded functionally, only caching
    /// was skipped.
    pub fn is_soft(&self) -> bool {
        matches!(self, Error::EntryTooLarge { .. })
    }

    /// Whether the error came from the filesystem collaborator
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// Helper for `EntryTooLarge`
    pub fn too_large(weight: usize, capacity: usize) -> Self {
        Error::EntryTooLarge { weight, capacity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_soft_rejection() {
        assert!(Error::too_large(10, 5).is_soft());
        assert!(!Error::Config("bad".into()).is_soft());
    }

    #[test]
    fn test_io_conversion() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(err.is_io());
        assert!(err.to_string().contains("gone"));
    }
}
