//! Cache configuration and on-disk naming constants.

use crate::error::{CacheError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File names and extensions used inside a cache directory.
pub struct PathsConfig;

impl PathsConfig {
    pub const INDEX_FILE_NAME: &'static str = "index.json";
    pub const VALUE_EXTENSION: &'static str = "cache";
    pub const COMPRESSED_EXTENSION: &'static str = "cache.gz";
    pub const TEMP_PREFIX: &'static str = ".";
    pub const TEMP_SUFFIX: &'static str = ".tmp";
    pub const PROBE_PREFIX: &'static str = ".probe";
}

/// Configuration for a cache instance, fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Directory holding value files and the index file.
    pub cache_dir: PathBuf,
    /// Store value files DEFLATE-compressed.
    #[serde(default)]
    pub compression: bool,
    /// Ceiling on the total size of the cache directory in bytes.
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
    /// Rewrite the index file after every mutation.
    #[serde(default)]
    pub persist_on_write: bool,
}

fn default_max_size_bytes() -> u64 {
    CacheConfig::DEFAULT_MAX_SIZE_BYTES
}

impl CacheConfig {
    /// Default maximum cache size (64 MiB).
    pub const DEFAULT_MAX_SIZE_BYTES: u64 = 64 * 1024 * 1024;

    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            compression: false,
            max_size_bytes: Self::DEFAULT_MAX_SIZE_BYTES,
            persist_on_write: false,
        }
    }

    /// Check the values that can be checked without touching the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.cache_dir.as_os_str().is_empty() {
            return Err(CacheError::Config {
                message: "cache directory must not be empty".to_string(),
            });
        }
        if self.max_size_bytes == 0 {
            return Err(CacheError::Config {
                message: "max_size_bytes must be greater than zero".to_string(),
            });
        }
        if self.compression && !compression_supported() {
            return Err(CacheError::CompressionUnavailable);
        }
        Ok(())
    }

    /// Extension of value files under this configuration.
    pub fn value_extension(&self) -> &'static str {
        if self.compression {
            PathsConfig::COMPRESSED_EXTENSION
        } else {
            PathsConfig::VALUE_EXTENSION
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.cache_dir.join(PathsConfig::INDEX_FILE_NAME)
    }
}

/// Whether this build can read and write compressed value files.
pub fn compression_supported() -> bool {
    cfg!(feature = "compression")
}
