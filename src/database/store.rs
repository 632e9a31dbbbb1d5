//! Storage collaborator contract.
//!
//! The backend never talks to a driver directly; it composes over any
//! `DocumentStore`. Implementations must make `upsert` a single atomic
//! replace-or-insert and `extend_expire` a single atomic update.

use async_trait::async_trait;

use super::filter::Filter;
use super::models::{CacheEntry, EntryMetadata};
use crate::error::Result;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch at most one entry matching `filter`.
    async fn find_one(&self, filter: &Filter) -> Result<Option<CacheEntry>>;

    /// Ids of every entry matching `filter`.
    async fn find_ids(&self, filter: &Filter) -> Result<Vec<String>>;

    /// Tags and timestamps of one entry, without its payload.
    async fn find_metadata(&self, id: &str) -> Result<Option<EntryMetadata>>;

    /// Replace the entry with the same id, or insert it.
    async fn upsert(&self, entry: &CacheEntry) -> Result<()>;

    /// Returns `true` if an entry was deleted.
    async fn delete_one(&self, id: &str) -> Result<bool>;

    /// Returns the number of deleted entries.
    async fn delete_many(&self, filter: &Filter) -> Result<u64>;

    /// Every distinct tag across all entries.
    async fn distinct_tags(&self) -> Result<Vec<String>>;

    /// Add `extra` seconds to a finite `expire` and set `mtime`.
    ///
    /// Immortal entries keep `expire == 0`. Returns `false` when no entry
    /// has that id.
    async fn extend_expire(&self, id: &str, extra: i64, mtime: i64) -> Result<bool>;

    /// Overwrite `expire` and `mtime` in one atomic update.
    ///
    /// Returns `false` when no entry has that id; nothing is inserted.
    async fn set_expire(&self, id: &str, expire: i64, mtime: i64) -> Result<bool>;
}
