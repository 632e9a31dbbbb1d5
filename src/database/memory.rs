//! In-process storage collaborator.
//!
//! Same semantics as the MongoDB collaborator, backed by a `DashMap`.
//! Per-key writes are serialized by the map's shard locks.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use super::filter::Filter;
use super::models::{CacheEntry, EntryMetadata};
use super::store::DocumentStore;
use crate::error::Result;

/// Shared in-memory entry table.
///
/// Clone-friendly: clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, stale ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_one(&self, filter: &Filter) -> Result<Option<CacheEntry>> {
        if let Some(id) = filter.target_id() {
            return Ok(self
                .entries
                .get(id)
                .filter(|e| filter.matches(e.value()))
                .map(|e| e.value().clone()));
        }
        Ok(self
            .entries
            .iter()
            .find(|e| filter.matches(e.value()))
            .map(|e| e.value().clone()))
    }

    async fn find_ids(&self, filter: &Filter) -> Result<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| e.key().clone())
            .collect())
    }

    async fn find_metadata(&self, id: &str) -> Result<Option<EntryMetadata>> {
        Ok(self.entries.get(id).map(|e| e.value().metadata()))
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        self.entries.insert(entry.id.clone(), entry.clone());
        Ok(())
    }

    async fn delete_one(&self, id: &str) -> Result<bool> {
        Ok(self.entries.remove(id).is_some())
    }

    async fn delete_many(&self, filter: &Filter) -> Result<u64> {
        let mut removed = 0u64;
        self.entries.retain(|_, entry| {
            let matched = filter.matches(entry);
            if matched {
                removed += 1;
            }
            !matched
        });
        Ok(removed)
    }

    async fn distinct_tags(&self) -> Result<Vec<String>> {
        let tags: BTreeSet<String> = self
            .entries
            .iter()
            .flat_map(|e| e.value().tags.clone())
            .collect();
        Ok(tags.into_iter().collect())
    }

    async fn extend_expire(&self, id: &str, extra: i64, mtime: i64) -> Result<bool> {
        match self.entries.get_mut(id) {
            Some(mut entry) => {
                if !entry.is_immortal() {
                    entry.expire += extra;
                }
                entry.mtime = mtime;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_expire(&self, id: &str, expire: i64, mtime: i64) -> Result<bool> {
        match self.entries.get_mut(id) {
            Some(mut entry) => {
                entry.expire = expire;
                entry.mtime = mtime;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
