//! Cache key validation.
//!
//! A key becomes the stem of its value file name, so it has to be a single
//! well-formed path component on every platform we write to.

use crate::error::{CacheError, Result};
use std::fmt;

/// A validated cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Longest accepted key in bytes, leaving room for the file extension.
    pub const MAX_LEN: usize = 200;

    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        if let Some(reason) = rejection_reason(&key) {
            return Err(CacheError::InvalidKey {
                key,
                reason: reason.to_string(),
            });
        }
        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value file name for this key with the given extension.
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.0, extension)
    }
}

fn rejection_reason(key: &str) -> Option<&'static str> {
    if key.is_empty() {
        return Some("key must not be empty");
    }
    if key.len() > CacheKey::MAX_LEN {
        return Some("key is too long");
    }
    if key == "." || key == ".." {
        return Some("key must not be a relative directory name");
    }
    if key.chars().any(|c| matches!(c, '/' | '\\' | '\0')) {
        return Some("key must not contain path separators or NUL");
    }
    if key.chars().any(|c| c.is_ascii_control()) {
        return Some("key must not contain control characters");
    }
    if key.chars().any(|c| RESERVED_CHARS.contains(&c)) {
        return Some("key must not contain any of : * ? \" < > |");
    }
    if key.ends_with('.') || key.ends_with(' ') {
        return Some("key must not end with a dot or space");
    }
    if is_reserved_device_name(key) {
        return Some("key must not be a reserved device name");
    }
    None
}

/// Characters Windows refuses in a file name.
const RESERVED_CHARS: [char; 7] = [':', '*', '?', '"', '<', '>', '|'];

/// `CON`, `NUL`, `COM1` and friends are reserved on Windows even with an
/// extension appended.
fn is_reserved_device_name(key: &str) -> bool {
    let stem = key.split('.').next().unwrap_or(key).trim_end();
    let upper = stem.to_ascii_uppercase();
    match upper.as_str() {
        "CON" | "PRN" | "AUX" | "NUL" => true,
        _ => {
            let bytes = upper.as_bytes();
            bytes.len() == 4
                && (upper.starts_with("COM") || upper.starts_with("LPT"))
                && matches!(bytes[3], b'1'..=b'9')
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for CacheKey {
    type Error = CacheError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_keys() {
        for key in [
            "a",
            "user-42",
            "report-2024.json",
            "spaced key",
            "console",
            "COM0",
            "lpt10",
        ] {
            assert!(CacheKey::new(key).is_ok(), "{key} should be accepted");
        }
    }

    #[test]
    fn test_rejects_unsafe_keys() {
        for key in ["", ".", "..", "a/b", "a\\b", "nul\0byte"] {
            assert!(
                matches!(CacheKey::new(key), Err(CacheError::InvalidKey { .. })),
                "{key:?} should be rejected"
            );
        }
        assert!(CacheKey::new("k".repeat(CacheKey::MAX_LEN + 1)).is_err());
    }

    #[test]
    fn test_rejects_keys_invalid_on_windows() {
        for key in [
            "user:42", "a*b", "why?", "say\"hi\"", "<tag>", "a|b", "tab\tkey", "bell\u{7}",
            "del\u{7f}", "trailing.", "trailing ", "CON", "nul", "aux.json", "Com1", "LPT9.log",
        ] {
            assert!(
                matches!(CacheKey::new(key), Err(CacheError::InvalidKey { .. })),
                "{key:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_file_name() {
        let key = CacheKey::new("session").unwrap();
        assert_eq!(key.file_name("cache"), "session.cache");
        assert_eq!(key.file_name("cache.gz"), "session.cache.gz");
    }
}
