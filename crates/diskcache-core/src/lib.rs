//! diskcache - a single-node, disk-backed key/value cache.
//!
//! Values are serialized to one file per key inside a cache directory,
//! optionally DEFLATE-compressed. An in-memory metadata index maps each key
//! to its expiry and is mirrored to `index.json`. Writes are admitted only
//! while the directory stays under a configured size ceiling; expired
//! entries are evicted lazily on access or by an explicit freshen sweep.
//!
//! # Example
//!
//! ```rust,no_run
//! use diskcache::DiskCache;
//!
//! fn main() -> diskcache::Result<()> {
//!     let cache = DiskCache::builder("/tmp/my-cache").build()?;
//!
//!     cache.set("answer", &42u32, Some(300))?;
//!     let answer: Option<u32> = cache.get("answer")?;
//!     assert_eq!(answer, Some(42));
//!
//!     cache.expire("answer")?;
//!     cache.close()
//! }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod index;
pub mod key;
pub mod store;

// Re-export commonly used types
pub use cache::{CacheStats, DiskCache, DiskCacheBuilder, EntryInfo, SetOutcome};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use error::{CacheError, ErrorKind, Result};
pub use index::{Expiry, Validity};
pub use key::CacheKey;
