//! Builder for configuring a [`DiskCache`].

use super::DiskCache;
use crate::clock::{Clock, SystemClock};
use crate::config::CacheConfig;
use crate::error::Result;
use std::path::PathBuf;
use std::sync::Arc;

/// Builder for configuring a [`DiskCache`].
///
/// # Example
///
/// ```rust,no_run
/// use diskcache::DiskCache;
///
/// # fn main() -> diskcache::Result<()> {
/// let cache = DiskCache::builder("/var/cache/myapp")
///     .compression(true)
///     .max_size_bytes(16 * 1024 * 1024)
///     .build()?;
/// cache.set("greeting", "hello", Some(60))?;
/// cache.close()?;
/// # Ok(())
/// # }
/// ```
pub struct DiskCacheBuilder {
    config: CacheConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl DiskCacheBuilder {
    /// Create a new builder for the given cache directory.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            config: CacheConfig::new(cache_dir),
            clock: None,
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: CacheConfig) -> Self {
        Self {
            config,
            clock: None,
        }
    }

    /// Store values DEFLATE-compressed.
    ///
    /// Fails at build time if the crate was compiled without the
    /// `compression` feature.
    ///
    /// Default: `false`
    pub fn compression(mut self, enable: bool) -> Self {
        self.config.compression = enable;
        self
    }

    /// Ceiling on the total size of the cache directory.
    ///
    /// Default: 64 MiB
    pub fn max_size_bytes(mut self, bytes: u64) -> Self {
        self.config.max_size_bytes = bytes;
        self
    }

    /// Rewrite the index file after every mutation instead of only on
    /// [`DiskCache::persist`] and [`DiskCache::close`].
    ///
    /// Default: `false`
    pub fn persist_on_write(mut self, enable: bool) -> Self {
        self.config.persist_on_write = enable;
        self
    }

    /// Use a custom time source for expiry decisions.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration, prepare the directory and load the index.
    pub fn build(self) -> Result<DiskCache> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        DiskCache::open_with_clock(self.config, clock)
    }
}
