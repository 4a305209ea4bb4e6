//! Atomic file replacement.
//!
//! Writes go through a temp file in the target's own directory:
//! 1. Write the payload to a uniquely named temp file
//! 2. Flush and fsync so the data reaches disk
//! 3. Rename the temp file over the target
//!
//! Readers therefore see either the old file or the complete new one. On any
//! error the temp file handle is closed and the temp file removed when the
//! `NamedTempFile` drops.

use crate::config::PathsConfig;
use crate::{CacheError, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Read and parse a JSON file.
///
/// Returns `None` if the file doesn't exist, or an error if parsing fails.
pub fn atomic_read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let contents = match fs::read(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(CacheError::Io {
                message: format!("Failed to read {}", path.display()),
                path: Some(path.to_path_buf()),
                source: Some(e),
            })
        }
    };

    let data: T = serde_json::from_slice(&contents).map_err(|e| CacheError::Json {
        message: format!("Failed to parse {}: {}", path.display(), e),
        source: Some(e),
    })?;

    Ok(Some(data))
}

/// Serialize `data` as pretty JSON and replace `path` with it atomically.
pub fn atomic_write_json<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    let serialized = serde_json::to_vec_pretty(data).map_err(|e| CacheError::Json {
        message: format!("Failed to serialize {}: {}", path.display(), e),
        source: Some(e),
    })?;
    atomic_write_bytes(path, &serialized)
}

/// Replace `path` with `bytes` atomically.
///
/// The parent directory must already exist.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().ok_or_else(|| CacheError::Io {
        message: format!("{} has no parent directory", path.display()),
        path: Some(path.to_path_buf()),
        source: None,
    })?;

    let mut temp = tempfile::Builder::new()
        .prefix(PathsConfig::TEMP_PREFIX)
        .suffix(PathsConfig::TEMP_SUFFIX)
        .tempfile_in(dir)
        .map_err(|e| CacheError::Io {
            message: format!("Failed to create temp file in {}", dir.display()),
            path: Some(dir.to_path_buf()),
            source: Some(e),
        })?;

    write_and_sync(&mut temp, bytes).map_err(|e| CacheError::Io {
        message: format!("Failed to write temp file {}", temp.path().display()),
        path: Some(temp.path().to_path_buf()),
        source: Some(e),
    })?;

    temp.persist(path).map_err(|e| CacheError::Io {
        message: format!(
            "Failed to rename {} to {}",
            e.file.path().display(),
            path.display()
        ),
        path: Some(path.to_path_buf()),
        source: Some(e.error),
    })?;

    debug!("Atomically wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}

fn write_and_sync(temp: &mut NamedTempFile, bytes: &[u8]) -> std::io::Result<()> {
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()
}

/// Whether a file name looks like a temp file left by an interrupted write.
pub fn is_temp_file_name(name: &str) -> bool {
    name.starts_with(PathsConfig::TEMP_PREFIX) && name.ends_with(PathsConfig::TEMP_SUFFIX)
}
