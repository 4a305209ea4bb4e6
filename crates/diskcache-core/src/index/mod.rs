//! Metadata index: the single source of truth for which keys exist and
//! whether they are still valid.

mod metadata;

pub use metadata::{Expiry, MetadataIndex, Validity};
