//! Error types for diskcache.
//!
//! Every failure a caller can observe falls into one of four kinds:
//! configuration (fatal at construction), capacity (recoverable),
//! storage (an unexpected I/O fault) and validation (bad caller input).
//! Absent keys are never errors.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Cache directory is not writable: {path:?}")]
    DirectoryNotWritable {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Compression requested but this build does not support it")]
    CompressionUnavailable,

    // Capacity errors
    #[error("Cache full: {required} bytes required, limit is {max_size} bytes")]
    CapacityExceeded { required: u64, max_size: u64 },

    // Storage faults
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Cache directory is missing: {0}")]
    CacheDirectoryMissing(PathBuf),

    #[error("Index lists {key} but its value file {path:?} is missing")]
    IndexDivergence { key: String, path: PathBuf },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Compression error: {message}")]
    Compression { message: String },

    #[error("Index lock poisoned")]
    LockPoisoned,

    // Validation errors
    #[error("Invalid cache key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Invalid TTL of {0} seconds")]
    InvalidTtl(u64),

    #[error("Invalid params: {message}")]
    InvalidParams { message: String },
}

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Coarse classification of a [`CacheError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Capacity,
    Storage,
    Validation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Capacity => "capacity",
            ErrorKind::Storage => "storage",
            ErrorKind::Validation => "validation",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl CacheError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        CacheError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::Config { .. }
            | CacheError::DirectoryNotWritable { .. }
            | CacheError::CompressionUnavailable => ErrorKind::Configuration,

            CacheError::CapacityExceeded { .. } => ErrorKind::Capacity,

            CacheError::InvalidKey { .. }
            | CacheError::InvalidTtl(_)
            | CacheError::InvalidParams { .. } => ErrorKind::Validation,

            CacheError::Io { .. }
            | CacheError::CacheDirectoryMissing(_)
            | CacheError::IndexDivergence { .. }
            | CacheError::Json { .. }
            | CacheError::Compression { .. }
            | CacheError::LockPoisoned => ErrorKind::Storage,
        }
    }

    /// Stable numeric code for front ends.
    ///
    /// - -32001: Configuration error
    /// - -32002: Cache full
    /// - -32003: Storage fault
    /// - -32602: Invalid params / key / TTL
    pub fn error_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Configuration => -32001,
            ErrorKind::Capacity => -32002,
            ErrorKind::Storage => -32003,
            ErrorKind::Validation => -32602,
        }
    }

    /// Check if retrying the operation after freeing space could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::CapacityExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::CapacityExceeded {
            required: 160,
            max_size: 100,
        };
        assert_eq!(
            err.to_string(),
            "Cache full: 160 bytes required, limit is 100 bytes"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            CacheError::CompressionUnavailable.kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            CacheError::CacheDirectoryMissing(PathBuf::from("/tmp/x")).kind(),
            ErrorKind::Storage
        );
        assert_eq!(CacheError::InvalidTtl(1).kind(), ErrorKind::Validation);
        assert_eq!(CacheError::LockPoisoned.error_code(), -32003);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(CacheError::CapacityExceeded {
            required: 1,
            max_size: 0
        }
        .is_retryable());
        assert!(!CacheError::IndexDivergence {
            key: "a".into(),
            path: PathBuf::from("a.cache"),
        }
        .is_retryable());
    }

    #[test]
    fn test_io_error_keeps_path() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        match CacheError::io_with_path(io, "/cache/a.cache") {
            CacheError::Io { path, .. } => assert_eq!(path, Some(PathBuf::from("/cache/a.cache"))),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
