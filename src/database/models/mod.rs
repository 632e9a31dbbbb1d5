//! Database model exports.

pub mod cache_entry;

pub use cache_entry::{CacheEntry, EntryMetadata, NEVER_EXPIRES};
