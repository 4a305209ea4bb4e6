//! Values returned by cache operations.

use crate::index::Expiry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What `set` did. Informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetOutcome {
    /// The key was not present before.
    Stored,
    /// An existing entry (valid or stale) was replaced.
    Overwrote,
}

impl SetOutcome {
    pub fn is_overwrite(&self) -> bool {
        matches!(self, SetOutcome::Overwrote)
    }
}

/// Metadata about one stored entry, as reported by `read`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub key: String,
    /// Serialized as `null` when the entry never expires.
    pub expires_at: Expiry,
    /// Size of the value file on disk.
    pub size_bytes: u64,
    pub cache_dir: PathBuf,
    /// Value file name relative to `cache_dir`.
    pub file_name: String,
    /// Past its expiry but not yet evicted.
    pub stale: bool,
}

/// Cache statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of keys in the index.
    pub total_entries: usize,
    pub valid_entries: usize,
    pub stale_entries: usize,
    /// On-disk size of the cache directory in bytes.
    pub total_size_bytes: u64,
    /// Maximum allowed size in bytes.
    pub max_size_bytes: u64,
    pub compression: bool,
    pub cache_dir: PathBuf,
}
