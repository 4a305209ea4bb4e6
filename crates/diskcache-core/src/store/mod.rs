//! Value store: the on-disk half of the cache.
//!
//! This module provides:
//! - Atomic file replacement for value files and the index file
//! - Value encoding (JSON, optionally DEFLATE-compressed)
//! - The per-key file layout and directory size accounting

mod atomic;
mod codec;
mod value_store;

pub use atomic::{atomic_read_json, atomic_write_bytes, atomic_write_json};
pub use codec::{decode, encode, unpack};
pub use value_store::ValueStore;
