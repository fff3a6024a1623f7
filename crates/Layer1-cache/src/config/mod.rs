//! Cache configuration
//!
//! Every field has a serde default so partial files are accepted.
//! Files are loaded from JSON or TOML depending on the extension.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::cache::PressureLevel;
use crate::{Error, Result};

/// Admission ceiling for the file content tier (512 KiB)
pub const FILE_CONTENT_MAX_SIZE: usize = 512 * 1024;

/// Cache system configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    /// File content tier
    #[serde(default)]
    pub file_content: FileContentConfig,

    /// TTLs of the search / computed / tree tiers
    #[serde(default)]
    pub ttl: TtlConfig,

    /// Background expiry sweep
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Memory pressure reaction
    #[serde(default)]
    pub pressure: PressureConfig,
}

/// How the file content tier weighs its entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeighBy {
    /// Every entry weighs 1; capacity is an entry count
    Entries,
    /// Entries weigh their content length; capacity is a byte budget
    Bytes,
}

/// File content tier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileContentConfig {
    /// Capacity weight of the tier (entries or bytes, see `weigh_by`)
    #[serde(default = "default_file_capacity")]
    pub capacity: usize,

    /// Files whose content is longer than this are returned but never stored
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,

    /// Weight function of the tier
    #[serde(default = "default_weigh_by")]
    pub weigh_by: WeighBy,
}

/// TTL configuration (seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtlConfig {
    #[serde(default = "default_search_ttl_secs")]
    pub search_secs: u64,

    /// Default TTL of computed values when the caller passes none
    #[serde(default = "default_computed_ttl_secs")]
    pub computed_secs: u64,

    #[serde(default = "default_tree_ttl_secs")]
    pub tree_secs: u64,
}

/// Background sweep configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_sweep_enabled")]
    pub enabled: bool,
}

/// Memory pressure configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PressureConfig {
    /// Lowest level that triggers `trim_all`
    #[serde(default = "default_trim_at")]
    pub trim_at: PressureLevel,
}

// Default value functions
fn default_file_capacity() -> usize {
    200
}
fn default_max_file_size() -> usize {
    FILE_CONTENT_MAX_SIZE
}
fn default_weigh_by() -> WeighBy {
    WeighBy::Entries
}
fn default_search_ttl_secs() -> u64 {
    60
}
fn default_computed_ttl_secs() -> u64 {
    300
} // 5 minutes
fn default_tree_ttl_secs() -> u64 {
    300
} // 5 minutes
fn default_sweep_interval_secs() -> u64 {
    300
} // 5 minutes
fn default_sweep_enabled() -> bool {
    true
}
fn default_trim_at() -> PressureLevel {
    PressureLevel::High
}

impl Default for FileContentConfig {
    fn default() -> Self {
        Self {
            capacity: default_file_capacity(),
            max_file_size: default_max_file_size(),
            weigh_by: default_weigh_by(),
        }
    }
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            search_secs: default_search_ttl_secs(),
            computed_secs: default_computed_ttl_secs(),
            tree_secs: default_tree_ttl_secs(),
        }
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
            enabled: default_sweep_enabled(),
        }
    }
}

impl Default for PressureConfig {
    fn default() -> Self {
        Self {
            trim_at: default_trim_at(),
        }
    }
}

impl TtlConfig {
    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_secs)
    }

    pub fn computed_ttl(&self) -> Duration {
        Duration::from_secs(self.computed_secs)
    }

    pub fn tree_ttl(&self) -> Duration {
        Duration::from_secs(self.tree_secs)
    }
}

impl SweepConfig {
    /// Sweep interval, `None` when the sweep is disabled
    pub fn interval(&self) -> Option<Duration> {
        if self.enabled && self.interval_secs > 0 {
            Some(Duration::from_secs(self.interval_secs))
        } else {
            None
        }
    }
}

impl CacheConfig {
    /// Create a minimal config for resource-constrained environments
    pub fn minimal() -> Self {
        Self {
            file_content: FileContentConfig {
                capacity: 50,
                max_file_size: 128 * 1024,
                weigh_by: WeighBy::Entries,
            },
            ttl: TtlConfig {
                search_secs: 30,
                computed_secs: 120,
                tree_secs: 120,
            },
            sweep: SweepConfig {
                interval_secs: 60,
                enabled: true,
            },
            pressure: PressureConfig {
                trim_at: PressureLevel::Moderate,
            },
        }
    }

    /// Create an aggressive caching config for large projects
    pub fn performance() -> Self {
        Self {
            file_content: FileContentConfig {
                capacity: 64 * 1024 * 1024, // 64 MiB
                max_file_size: FILE_CONTENT_MAX_SIZE,
                weigh_by: WeighBy::Bytes,
            },
            ttl: TtlConfig {
                search_secs: 120,
                computed_secs: 600,
                tree_secs: 600,
            },
            sweep: SweepConfig::default(),
            pressure: PressureConfig {
                trim_at: PressureLevel::Critical,
            },
        }
    }

    /// Parse a JSON document
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.toml` or `.json` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(Error::Config(format!(
                "unsupported config format: {}",
                other.unwrap_or("<none>")
            ))),
        }
    }

    /// Reject configurations the tiers cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.file_content.capacity == 0 {
            return Err(Error::Config("file_content.capacity must be > 0".into()));
        }
        if self.file_content.max_file_size == 0 {
            return Err(Error::Config(
                "file_content.max_file_size must be > 0".into(),
            ));
        }
        Ok(())
    }
}
