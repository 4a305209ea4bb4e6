//! In-memory metadata index mirrored to `index.json`.

use crate::key::CacheKey;
use crate::store::{atomic_read_json, atomic_write_json};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// When an entry stops being valid.
///
/// Serialized as `null` for [`Expiry::Never`] and as an RFC 3339 timestamp
/// otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<DateTime<Utc>>", into = "Option<DateTime<Utc>>")]
pub enum Expiry {
    Never,
    At(DateTime<Utc>),
}

impl Expiry {
    /// Expiry for a TTL in seconds measured from `now`. Zero means never.
    ///
    /// Returns `None` if the deadline is not representable.
    pub fn from_ttl(now: DateTime<Utc>, ttl_secs: u64) -> Option<Self> {
        if ttl_secs == 0 {
            return Some(Expiry::Never);
        }
        let secs = i64::try_from(ttl_secs).ok()?;
        let delta = chrono::TimeDelta::try_seconds(secs)?;
        now.checked_add_signed(delta).map(Expiry::At)
    }

    pub fn is_passed(&self, now: DateTime<Utc>) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(at) => *at <= now,
        }
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Expiry::Never => None,
            Expiry::At(at) => Some(*at),
        }
    }
}

impl From<Option<DateTime<Utc>>> for Expiry {
    fn from(value: Option<DateTime<Utc>>) -> Self {
        value.map_or(Expiry::Never, Expiry::At)
    }
}

impl From<Expiry> for Option<DateTime<Utc>> {
    fn from(value: Expiry) -> Self {
        value.timestamp()
    }
}

/// Three-way answer to "may this key be served?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// Not in the index.
    Absent,
    /// In the index and not yet expired.
    Valid,
    /// In the index but past its expiry.
    Stale,
}

/// On-disk layout of the index file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    #[serde(default = "IndexFile::current_version")]
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, Expiry>,
}

impl IndexFile {
    const VERSION: u32 = 1;

    fn current_version() -> u32 {
        Self::VERSION
    }
}

/// Map of cache key to expiry, owned by one cache instance.
#[derive(Debug)]
pub struct MetadataIndex {
    path: PathBuf,
    entries: BTreeMap<CacheKey, Expiry>,
    dirty: bool,
}

impl MetadataIndex {
    /// An empty index that will persist to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            dirty: false,
        }
    }

    /// Load the index file, or start empty if it does not exist.
    ///
    /// Entries whose key is no longer acceptable are dropped.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut index = Self::empty(&path);

        let Some(file) = atomic_read_json::<IndexFile>(&path)? else {
            debug!("No index file at {}, starting empty", path.display());
            return Ok(index);
        };

        if file.version != IndexFile::VERSION {
            warn!(
                "Index file {} has version {}, expected {}",
                path.display(),
                file.version,
                IndexFile::VERSION
            );
        }

        for (raw, expiry) in file.entries {
            match CacheKey::new(raw) {
                Ok(key) => {
                    index.entries.insert(key, expiry);
                }
                Err(e) => {
                    warn!("Dropping index entry: {}", e);
                    index.dirty = true;
                }
            }
        }

        debug!("Loaded {} index entries from {}", index.len(), path.display());
        Ok(index)
    }

    /// Write the whole index to its file, replacing what was there.
    pub fn persist(&mut self) -> Result<()> {
        let file = IndexFile {
            version: IndexFile::VERSION,
            entries: self
                .entries
                .iter()
                .map(|(k, v)| (k.as_str().to_string(), *v))
                .collect(),
        };
        atomic_write_json(&self.path, &file)?;
        self.dirty = false;
        Ok(())
    }

    pub fn validity(&self, key: &CacheKey, now: DateTime<Utc>) -> Validity {
        match self.entries.get(key) {
            None => Validity::Absent,
            Some(expiry) if expiry.is_passed(now) => Validity::Stale,
            Some(_) => Validity::Valid,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Expiry> {
        self.entries.get(key).copied()
    }

    pub fn insert(&mut self, key: CacheKey, expiry: Expiry) -> Option<Expiry> {
        self.dirty = true;
        self.entries.insert(key, expiry)
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<Expiry> {
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&CacheKey, &Expiry) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, v| keep(k, v));
        let dropped = before - self.entries.len();
        if dropped > 0 {
            self.dirty = true;
        }
        dropped
    }

    /// Keys whose expiry has passed at `now`.
    pub fn stale_keys(&self, now: DateTime<Utc>) -> Vec<CacheKey> {
        self.entries
            .iter()
            .filter(|(_, expiry)| expiry.is_passed(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Force the next drop-time persist to rewrite the index file.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Whether there are changes not yet written by [`persist`](Self::persist).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
