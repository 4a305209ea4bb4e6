//! One file per key inside the cache directory.

use super::atomic::{atomic_write_bytes, is_temp_file_name};
use crate::config::PathsConfig;
use crate::key::CacheKey;
use crate::{CacheError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Filesystem side of the cache: value files named `<key>.<extension>`.
#[derive(Debug, Clone)]
pub struct ValueStore {
    dir: PathBuf,
    extension: &'static str,
}

impl ValueStore {
    pub fn new(dir: impl Into<PathBuf>, extension: &'static str) -> Self {
        Self {
            dir: dir.into(),
            extension,
        }
    }

    /// Create the directory if needed and verify we can write into it.
    pub fn bootstrap(&self) -> Result<()> {
        if self.dir.exists() && !self.dir.is_dir() {
            return Err(CacheError::Config {
                message: format!("{} exists and is not a directory", self.dir.display()),
            });
        }

        fs::create_dir_all(&self.dir).map_err(|e| CacheError::DirectoryNotWritable {
            path: self.dir.clone(),
            source: Some(e),
        })?;

        // The probe is removed when it drops.
        tempfile::Builder::new()
            .prefix(PathsConfig::PROBE_PREFIX)
            .tempfile_in(&self.dir)
            .map_err(|e| CacheError::DirectoryNotWritable {
                path: self.dir.clone(),
                source: Some(e),
            })?;

        debug!("Cache directory ready: {}", self.dir.display());
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(&self, key: &CacheKey) -> String {
        key.file_name(self.extension)
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(self.file_name(key))
    }

    pub fn exists(&self, key: &CacheKey) -> bool {
        self.path_for(key).is_file()
    }

    /// Read the stored payload for a key the index says exists.
    pub fn read(&self, key: &CacheKey) -> Result<Vec<u8>> {
        self.ensure_dir()?;
        let path = self.path_for(key);
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => CacheError::IndexDivergence {
                key: key.to_string(),
                path: path.clone(),
            },
            _ => CacheError::io_with_path(e, &path),
        })
    }

    /// Replace the key's value file with `payload`.
    pub fn write(&self, key: &CacheKey, payload: &[u8]) -> Result<()> {
        self.ensure_dir()?;
        atomic_write_bytes(&self.path_for(key), payload)
    }

    /// Delete the key's value file.
    ///
    /// A missing file counts as already removed. Files left under the other
    /// extension (from an instance opened with the opposite compression
    /// setting) are removed too. Returns whether anything was deleted.
    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        let mut removed = false;
        for extension in [PathsConfig::VALUE_EXTENSION, PathsConfig::COMPRESSED_EXTENSION] {
            let path = self.dir.join(key.file_name(extension));
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Removed {}", path.display());
                    removed = true;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::io_with_path(e, &path)),
            }
        }
        Ok(removed)
    }

    /// Size in bytes of the key's value file, if it exists.
    pub fn file_size(&self, key: &CacheKey) -> Result<Option<u64>> {
        let path = self.path_for(key);
        match fs::metadata(&path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::io_with_path(e, &path)),
        }
    }

    /// Total size of every file under the cache directory.
    ///
    /// Counts files the index does not know about as well.
    pub fn dir_size(&self) -> Result<u64> {
        self.ensure_dir()?;
        let mut total = 0u64;
        for entry in WalkDir::new(&self.dir).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                // Temp files can disappear between listing and stat.
                Err(e) if e.io_error().map(|io| io.kind()) == Some(ErrorKind::NotFound) => {
                    continue
                }
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| self.dir.clone());
                    return Err(CacheError::Io {
                        message: format!("Failed to walk cache directory: {}", e),
                        path: Some(path),
                        source: e.into_io_error(),
                    });
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            match entry.metadata() {
                Ok(meta) => total += meta.len(),
                Err(e) if e.io_error().map(|io| io.kind()) == Some(ErrorKind::NotFound) => {}
                Err(e) => {
                    return Err(CacheError::Io {
                        message: format!("Failed to stat {}: {}", entry.path().display(), e),
                        path: Some(entry.path().to_path_buf()),
                        source: e.into_io_error(),
                    })
                }
            }
        }
        Ok(total)
    }

    /// Keys of every value file currently on disk under this store's extension.
    pub fn stored_keys(&self) -> Result<Vec<CacheKey>> {
        let mut keys = Vec::new();
        for name in self.file_names()? {
            let Some(stem) = name.strip_suffix(&format!(".{}", self.extension)) else {
                continue;
            };
            if let Ok(key) = CacheKey::new(stem) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Remove value files whose key `is_known` rejects, plus leftover temp
    /// files. Returns the number of files removed.
    pub fn sweep_orphans(&self, is_known: impl Fn(&str) -> bool) -> Result<usize> {
        let mut removed = 0;
        for name in self.file_names()? {
            let orphan = if is_temp_file_name(&name) {
                true
            } else if let Some(stem) = value_file_stem(&name) {
                !is_known(stem)
            } else {
                false
            };
            if !orphan {
                continue;
            }

            let path = self.dir.join(&name);
            match fs::remove_file(&path) {
                Ok(()) => {
                    warn!("Removed orphaned cache file {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(CacheError::io_with_path(e, &path)),
            }
        }
        Ok(removed)
    }

    fn file_names(&self) -> Result<Vec<String>> {
        self.ensure_dir()?;
        let read_dir = fs::read_dir(&self.dir).map_err(|e| CacheError::io_with_path(e, &self.dir))?;
        let mut names = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| CacheError::io_with_path(e, &self.dir))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    pub(crate) fn ensure_dir(&self) -> Result<()> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(CacheError::CacheDirectoryMissing(self.dir.clone()))
        }
    }
}

/// Key part of a value file name under either extension.
fn value_file_stem(name: &str) -> Option<&str> {
    name.strip_suffix(&format!(".{}", PathsConfig::COMPRESSED_EXTENSION))
        .or_else(|| name.strip_suffix(&format!(".{}", PathsConfig::VALUE_EXTENSION)))
        .filter(|stem| !stem.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn key(s: &str) -> CacheKey {
        CacheKey::new(s).unwrap()
    }

    fn create_test_store() -> (TempDir, ValueStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = ValueStore::new(temp_dir.path().join("values"), "cache");
        store.bootstrap().unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_bootstrap_creates_directory() {
        let (temp, store) = create_test_store();
        assert!(temp.path().join("values").is_dir());
        assert_eq!(store.dir_size().unwrap(), 0);
    }

    #[test]
    fn test_bootstrap_rejects_file_path() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain-file");
        fs::write(&file, b"x").unwrap();

        let store = ValueStore::new(&file, "cache");
        assert!(matches!(store.bootstrap(), Err(CacheError::Config { .. })));
    }

    #[test]
    fn test_write_read_remove() {
        let (_temp, store) = create_test_store();
        let k = key("alpha");

        store.write(&k, b"payload").unwrap();
        assert!(store.exists(&k));
        assert_eq!(store.read(&k).unwrap(), b"payload");
        assert_eq!(store.file_size(&k).unwrap(), Some(7));
        assert_eq!(store.file_name(&k), "alpha.cache");

        assert!(store.remove(&k).unwrap());
        assert!(!store.exists(&k));
        assert!(!store.remove(&k).unwrap());
        assert_eq!(store.file_size(&k).unwrap(), None);
    }

    #[test]
    fn test_read_missing_file_is_divergence() {
        let (_temp, store) = create_test_store();
        assert!(matches!(
            store.read(&key("ghost")),
            Err(CacheError::IndexDivergence { .. })
        ));
    }

    #[test]
    fn test_missing_directory_reported() {
        let (temp, store) = create_test_store();
        fs::remove_dir_all(temp.path().join("values")).unwrap();

        assert!(matches!(
            store.read(&key("a")),
            Err(CacheError::CacheDirectoryMissing(_))
        ));
        assert!(matches!(
            store.dir_size(),
            Err(CacheError::CacheDirectoryMissing(_))
        ));
    }

    #[test]
    fn test_dir_size_counts_all_files() {
        let (temp, store) = create_test_store();
        store.write(&key("a"), &[0u8; 10]).unwrap();
        fs::write(temp.path().join("values").join("stray.bin"), [0u8; 5]).unwrap();
        fs::create_dir(temp.path().join("values").join("nested")).unwrap();
        fs::write(temp.path().join("values").join("nested").join("n"), [0u8; 3]).unwrap();

        assert_eq!(store.dir_size().unwrap(), 18);
    }

    #[test]
    fn test_remove_clears_other_extension() {
        let (temp, store) = create_test_store();
        let gz = temp.path().join("values").join("k.cache.gz");
        fs::write(&gz, b"old").unwrap();

        assert!(store.remove(&key("k")).unwrap());
        assert!(!gz.exists());
    }

    #[test]
    fn test_sweep_orphans() {
        let (temp, store) = create_test_store();
        let dir = temp.path().join("values");
        store.write(&key("kept"), b"1").unwrap();
        store.write(&key("orphan"), b"2").unwrap();
        fs::write(dir.join("old.cache.gz"), b"3").unwrap();
        fs::write(dir.join(".abc123.tmp"), b"4").unwrap();
        fs::write(dir.join("index.json"), b"{}").unwrap();

        let removed = store.sweep_orphans(|k| k == "kept").unwrap();
        assert_eq!(removed, 3);
        assert!(dir.join("kept.cache").exists());
        assert!(dir.join("index.json").exists());
        assert!(!dir.join("orphan.cache").exists());
    }

    #[test]
    fn test_stored_keys() {
        let (_temp, store) = create_test_store();
        store.write(&key("one"), b"1").unwrap();
        store.write(&key("two"), b"2").unwrap();

        let mut keys = store.stored_keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec![key("one"), key("two")]);
    }
}
