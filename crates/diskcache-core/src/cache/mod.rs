//! The cache engine.
//!
//! Every operation consults the [`MetadataIndex`] first, then touches the
//! [`ValueStore`], then updates the index. One mutex guards the index for the
//! whole of each operation, so validity checks, evictions and replacement
//! writes for a key never interleave.

mod builder;
mod types;

pub use builder::DiskCacheBuilder;
pub use types::{CacheStats, EntryInfo, SetOutcome};

use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::index::{Expiry, MetadataIndex, Validity};
use crate::key::CacheKey;
use crate::store::{self, ValueStore};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Disk-backed key/value cache with per-key TTLs and a size ceiling.
///
/// The index is written to disk by [`persist`](Self::persist),
/// [`close`](Self::close), on drop if it has unsaved changes, or after
/// every mutation when `persist_on_write` is enabled.
pub struct DiskCache {
    config: CacheConfig,
    store: ValueStore,
    index: Mutex<MetadataIndex>,
    clock: Arc<dyn Clock>,
}

impl DiskCache {
    /// Start building a cache rooted at `cache_dir`.
    pub fn builder(cache_dir: impl Into<PathBuf>) -> DiskCacheBuilder {
        DiskCacheBuilder::new(cache_dir)
    }

    /// Open a cache with the system clock.
    pub fn open(config: CacheConfig) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open a cache with a custom clock.
    ///
    /// Creates the directory if needed, checks it is writable, loads the
    /// index file and drops index entries whose value file has vanished.
    pub fn open_with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let store = ValueStore::new(&config.cache_dir, config.value_extension());
        store.bootstrap()?;

        let index_path = config.index_path();
        let mut index = match MetadataIndex::load(&index_path) {
            Ok(index) => index,
            Err(e @ CacheError::Json { .. }) => {
                warn!("Ignoring unreadable index file: {}", e);
                let mut index = MetadataIndex::empty(&index_path);
                index.mark_dirty();
                index
            }
            Err(e) => return Err(e),
        };

        let dropped = index.retain(|key, _| store.exists(key));
        if dropped > 0 {
            warn!(
                "Dropped {} index entries with no value file in {}",
                dropped,
                config.cache_dir.display()
            );
        }

        let orphans = store
            .stored_keys()?
            .into_iter()
            .filter(|key| index.get(key).is_none())
            .count();
        if orphans > 0 {
            debug!("{} value files are not in the index", orphans);
        }

        info!(
            "Opened cache at {} ({} entries, compression {})",
            config.cache_dir.display(),
            index.len(),
            if config.compression { "on" } else { "off" }
        );

        Ok(Self {
            config,
            store,
            index: Mutex::new(index),
            clock,
        })
    }

    /// Fetch and deserialize a value.
    ///
    /// Returns `Ok(None)` for absent keys and for stale keys, which are
    /// evicted as a side effect.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.fetch_payload(key)? {
            Some(payload) => store::decode(&payload, self.config.compression).map(Some),
            None => Ok(None),
        }
    }

    /// Like [`get`](Self::get) but returns the serialized value bytes.
    pub fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.fetch_payload(key)? {
            Some(payload) => store::unpack(&payload, self.config.compression).map(Some),
            None => Ok(None),
        }
    }

    /// Store a value under `key`.
    ///
    /// `ttl_secs` of `None` or `Some(0)` means the entry never expires. An
    /// existing entry is evicted first. If the write would push the cache
    /// over its size ceiling, stale entries are freshened out; if that is not
    /// enough the call fails with [`CacheError::CapacityExceeded`] and
    /// nothing is written.
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl_secs: Option<u64>,
    ) -> Result<SetOutcome> {
        let key = CacheKey::new(key)?;
        let ttl = ttl_secs.unwrap_or(0);
        let expiry = Expiry::from_ttl(self.clock.now(), ttl).ok_or(CacheError::InvalidTtl(ttl))?;
        let payload = store::encode(value, self.config.compression)?;

        let mut index = self.lock()?;
        let result = self.set_locked(&mut index, key, expiry, &payload);
        self.finish(&mut index, result)
    }

    /// Evict one key. Returns `false` if it was not present.
    pub fn expire(&self, key: &str) -> Result<bool> {
        let key = CacheKey::new(key)?;
        let mut index = self.lock()?;
        let result = self.evict_locked(&mut index, &key);
        self.finish(&mut index, result)
    }

    /// Evict every stale entry. Valid entries are never touched.
    ///
    /// Returns the number of entries evicted.
    pub fn freshen(&self) -> Result<usize> {
        let mut index = self.lock()?;
        let result = self.freshen_locked(&mut index);
        self.finish(&mut index, result)
    }

    /// Inspect an entry without evicting it, even if stale.
    pub fn read(&self, key: &str) -> Result<Option<EntryInfo>> {
        let key = CacheKey::new(key)?;
        let index = self.lock()?;
        let Some(expiry) = index.get(&key) else {
            return Ok(None);
        };

        self.store.ensure_dir()?;
        let size_bytes = self
            .store
            .file_size(&key)?
            .ok_or_else(|| CacheError::IndexDivergence {
                key: key.to_string(),
                path: self.store.path_for(&key),
            })?;

        Ok(Some(EntryInfo {
            key: key.to_string(),
            expires_at: expiry,
            size_bytes,
            cache_dir: self.store.dir().to_path_buf(),
            file_name: self.store.file_name(&key),
            stale: expiry.is_passed(self.clock.now()),
        }))
    }

    /// Whether `key` is present and not expired. No side effects.
    pub fn contains(&self, key: &str) -> Result<bool> {
        let key = CacheKey::new(key)?;
        let index = self.lock()?;
        Ok(index.validity(&key, self.clock.now()) == Validity::Valid)
    }

    /// Evict every entry regardless of validity, then remove value files the
    /// index does not know about and temp files from interrupted writes.
    ///
    /// Returns the number of indexed entries evicted.
    pub fn flush_cache(&self) -> Result<usize> {
        let mut index = self.lock()?;
        let result = self.flush_locked(&mut index);
        self.finish(&mut index, result)
    }

    /// Current on-disk size of the cache directory in bytes.
    pub fn cache_size(&self) -> Result<u64> {
        let _index = self.lock()?;
        self.store.dir_size()
    }

    /// Configured size ceiling in bytes.
    pub fn cache_max_size(&self) -> u64 {
        self.config.max_size_bytes
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let index = self.lock()?;
        let now = self.clock.now();
        let stale_entries = index.stale_keys(now).len();

        Ok(CacheStats {
            total_entries: index.len(),
            valid_entries: index.len() - stale_entries,
            stale_entries,
            total_size_bytes: self.store.dir_size()?,
            max_size_bytes: self.config.max_size_bytes,
            compression: self.config.compression,
            cache_dir: self.store.dir().to_path_buf(),
        })
    }

    /// Write the index file now.
    pub fn persist(&self) -> Result<()> {
        let mut index = self.lock()?;
        index.persist()?;
        debug!("Persisted {} index entries", index.len());
        Ok(())
    }

    /// Persist the index and release the cache.
    pub fn close(self) -> Result<()> {
        self.persist()
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn cache_dir(&self) -> &Path {
        self.store.dir()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MetadataIndex>> {
        self.index.lock().map_err(|_| CacheError::LockPoisoned)
    }

    /// Resolve a key to its stored payload, evicting it if stale.
    fn fetch_payload(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = CacheKey::new(key)?;
        let mut index = self.lock()?;

        match index.validity(&key, self.clock.now()) {
            Validity::Absent => Ok(None),
            Validity::Stale => {
                debug!("Evicting stale key {}", key);
                let result = self.evict_locked(&mut index, &key).map(|_| None);
                self.finish(&mut index, result)
            }
            Validity::Valid => match self.store.read(&key) {
                Ok(payload) => Ok(Some(payload)),
                Err(e @ CacheError::IndexDivergence { .. }) => {
                    // The file is gone, so the entry can never be served again.
                    index.remove(&key);
                    warn!("{}", e);
                    self.finish(&mut index, Err(e))
                }
                Err(e) => Err(e),
            },
        }
    }

    fn set_locked(
        &self,
        index: &mut MetadataIndex,
        key: CacheKey,
        expiry: Expiry,
        payload: &[u8],
    ) -> Result<SetOutcome> {
        let overwrote = self.evict_locked(index, &key)?;

        self.ensure_capacity(index, payload.len() as u64)?;
        self.store.write(&key, payload)?;

        debug!(
            "Stored {} ({} bytes, expires {:?})",
            key,
            payload.len(),
            expiry.timestamp()
        );
        index.insert(key, expiry);

        Ok(if overwrote {
            SetOutcome::Overwrote
        } else {
            SetOutcome::Stored
        })
    }

    /// Make room for `incoming` bytes, freshening once if needed.
    fn ensure_capacity(&self, index: &mut MetadataIndex, incoming: u64) -> Result<()> {
        let max_size = self.config.max_size_bytes;
        let current = self.store.dir_size()?;
        if current.saturating_add(incoming) <= max_size {
            return Ok(());
        }

        let evicted = self.freshen_locked(index)?;
        let current = self.store.dir_size()?;
        let required = current.saturating_add(incoming);
        if required <= max_size {
            debug!("Freshen evicted {} entries to make room", evicted);
            return Ok(());
        }

        Err(CacheError::CapacityExceeded { required, max_size })
    }

    /// Remove a key's file and index entry. `Ok(false)` if it was absent.
    fn evict_locked(&self, index: &mut MetadataIndex, key: &CacheKey) -> Result<bool> {
        if index.get(key).is_none() {
            return Ok(false);
        }
        // The index entry stays if the file cannot be removed.
        if !self.store.remove(key)? {
            debug!("Value file for {} was already gone", key);
        }
        index.remove(key);
        Ok(true)
    }

    fn freshen_locked(&self, index: &mut MetadataIndex) -> Result<usize> {
        let mut evicted = 0;
        for key in index.stale_keys(self.clock.now()) {
            if self.evict_locked(index, &key)? {
                evicted += 1;
            }
        }
        if evicted > 0 {
            info!("Freshen evicted {} stale entries", evicted);
        }
        Ok(evicted)
    }

    fn flush_locked(&self, index: &mut MetadataIndex) -> Result<usize> {
        let mut evicted = 0;
        for key in index.keys() {
            if self.evict_locked(index, &key)? {
                evicted += 1;
            }
        }
        let swept = self.store.sweep_orphans(|_| false)?;
        info!(
            "Flushed cache: {} entries evicted, {} stray files removed",
            evicted, swept
        );
        Ok(evicted)
    }

    /// Persist after a mutation when configured to, without masking the
    /// operation's own error.
    fn finish<T>(&self, index: &mut MetadataIndex, result: Result<T>) -> Result<T> {
        if !self.config.persist_on_write || !index.is_dirty() {
            return result;
        }
        match (index.persist(), result) {
            (Ok(()), result) => result,
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(original)) => {
                warn!("Failed to persist index: {}", e);
                Err(original)
            }
        }
    }
}

impl Drop for DiskCache {
    fn drop(&mut self) {
        let index = match self.index.get_mut() {
            Ok(index) => index,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !index.is_dirty() {
            return;
        }
        if let Err(e) = index.persist() {
            warn!(
                "Failed to persist cache index to {}: {}",
                index.path().display(),
                e
            );
        }
    }
}
