//! Cache backend: entry store, tag queries, invalidation and capabilities.
//!
//! ## Architecture
//!
//! - `CacheBackend` - per-id CRUD with expiry enforced on read (this file)
//! - `tags` - tag selectors and id/tag enumeration
//! - `clean` - clean modes and the invalidation pass
//! - `capabilities` - static capability descriptor
//!
//! The backend owns its storage collaborator and clock explicitly; all
//! expiry arithmetic happens here and collaborators only see integers.

mod capabilities;
mod clean;
mod tags;

pub use capabilities::{CAPABILITIES, Capabilities};
pub use clean::{CleanMode, CleanReport};
pub use tags::{TagMatch, TagSelector};

use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, DEFAULT_LIFETIME_SECS};
use crate::database::{CacheEntry, DocumentStore, EntryMetadata, Filter, NEVER_EXPIRES};
use crate::error::{CacheError, Result};

/// Lifetime requested for a single save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifetime {
    /// Use the backend's configured default lifetime.
    #[default]
    Default,
    /// Never expire.
    Infinite,
    /// Expire this many seconds after the save.
    Seconds(u64),
}

/// Tag-aware cache backend over a storage collaborator.
#[derive(Debug, Clone)]
pub struct CacheBackend<S, C = SystemClock> {
    store: S,
    clock: C,
    default_lifetime: Option<u64>,
}

impl<S: DocumentStore> CacheBackend<S> {
    /// Create a backend using the system clock and the default lifetime.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }

    /// Create a backend configured from `Config`.
    pub fn from_config(store: S, config: &Config) -> Self {
        Self::new(store).default_lifetime(config.default_lifetime)
    }
}

impl<S: DocumentStore, C: Clock> CacheBackend<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            default_lifetime: Some(DEFAULT_LIFETIME_SECS),
        }
    }

    /// Set the lifetime used by `Lifetime::Default` (`None` = infinite).
    #[must_use]
    pub fn default_lifetime(mut self, lifetime: Option<u64>) -> Self {
        self.default_lifetime = lifetime;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Static capability descriptor of this backend.
    pub fn capabilities(&self) -> Capabilities {
        CAPABILITIES
    }

    /// Load the payload of a cache entry.
    ///
    /// Returns `None` if the id is unknown, or if the entry is stale and
    /// `bypass_validity` is false.
    pub async fn load(&self, id: &str, bypass_validity: bool) -> Result<Option<Vec<u8>>> {
        let filter = self.lookup_filter(id, bypass_validity)?;
        let entry = self.store.find_one(&filter).await?;
        Ok(entry.map(|e| e.content))
    }

    /// Cheap freshness check: the entry's `mtime` if it is readable.
    pub async fn test(&self, id: &str) -> Result<Option<i64>> {
        let filter = self.lookup_filter(id, false)?;
        let entry = self.store.find_one(&filter).await?;
        Ok(entry.map(|e| e.mtime))
    }

    /// Store a payload under `id`, replacing any previous entry wholesale.
    pub async fn save<I, T>(
        &self,
        content: impl Into<Vec<u8>>,
        id: &str,
        tags: I,
        lifetime: Lifetime,
    ) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        validate_id(id)?;

        let now = self.now();
        let expire = match self.resolve_lifetime(lifetime) {
            None => NEVER_EXPIRES,
            Some(secs) => now.saturating_add(i64::try_from(secs).unwrap_or(i64::MAX)),
        };
        let entry = CacheEntry::new(
            id,
            content,
            tags.into_iter().map(Into::into).collect(),
            now,
            expire,
        );

        if let Err(e) = self.store.upsert(&entry).await {
            warn!("Impossible to store cache id={}: {}", id, e);
            return Err(e);
        }

        debug!("Saved cache id={} (expire={}, tags={:?})", id, expire, entry.tags);
        Ok(())
    }

    /// Remove an entry. Returns `false` if there was nothing to remove.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        let removed = self.store.delete_one(id).await?;
        debug!("Remove cache id={}: {}", id, removed);
        Ok(removed)
    }

    /// Tags, `mtime` and `expire` of an entry, stale or not.
    pub async fn metadata(&self, id: &str) -> Result<Option<EntryMetadata>> {
        validate_id(id)?;
        self.store.find_metadata(id).await
    }

    /// Give an entry `extra_secs` more lifetime and refresh its `mtime`.
    ///
    /// Applied as one atomic update, so concurrent touches all count.
    /// Finite entries get `expire = expire + extra_secs`. Immortal entries
    /// are the exception to that rule: `expire` stays `0` and only `mtime`
    /// is refreshed. Returns `false` for unknown ids.
    pub async fn touch(&self, id: &str, extra_secs: u64) -> Result<bool> {
        validate_id(id)?;
        let extra = i64::try_from(extra_secs)
            .map_err(|_| CacheError::validation("extra lifetime is out of range"))?;

        let touched = self.store.extend_expire(id, extra, self.now()).await?;
        debug!("Touch cache id={} (+{}s): {}", id, extra, touched);
        Ok(touched)
    }

    /// Force an entry to be stale right now.
    ///
    /// Intended for tests and maintenance. Runs as one update, so an entry
    /// removed concurrently is never recreated. Returns `false` for unknown ids.
    pub async fn expire_now(&self, id: &str) -> Result<bool> {
        validate_id(id)?;
        let now = self.now();
        self.store.set_expire(id, now - 1, now).await
    }

    fn resolve_lifetime(&self, lifetime: Lifetime) -> Option<u64> {
        match lifetime {
            Lifetime::Default => self.default_lifetime,
            Lifetime::Infinite => None,
            Lifetime::Seconds(secs) => Some(secs),
        }
    }

    fn lookup_filter(&self, id: &str, bypass_validity: bool) -> Result<Filter> {
        validate_id(id)?;
        let filter = Filter::Id(id.to_string());
        if bypass_validity {
            Ok(filter)
        } else {
            Ok(filter.and(Filter::live_at(self.now())))
        }
    }
}

fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CacheError::validation("cache id must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::database::MemoryStore;

    const START: i64 = 1_700_000_000;

    fn backend() -> (CacheBackend<MemoryStore, ManualClock>, ManualClock) {
        let clock = ManualClock::new(START);
        let backend = CacheBackend::with_clock(MemoryStore::new(), clock.clone());
        (backend, clock)
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let (backend, _) = backend();

        assert_eq!(backend.load("nope", false).await.unwrap(), None);
        assert_eq!(backend.load("nope", true).await.unwrap(), None);
        assert_eq!(backend.test("nope").await.unwrap(), None);
        assert_eq!(backend.metadata("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_infinite_lifetime_never_expires() {
        let (backend, clock) = backend();
        backend.save("v", "k", ["a", "b"], Lifetime::Infinite).await.unwrap();

        clock.advance(10 * 365 * 86_400);

        assert_eq!(backend.load("k", false).await.unwrap(), Some(b"v".to_vec()));
        assert!(backend.test("k").await.unwrap().unwrap() > 0);
        assert_eq!(backend.metadata("k").await.unwrap().unwrap().expire, 0);
    }

    #[tokio::test]
    async fn test_finite_lifetime_boundary() {
        let (backend, clock) = backend();
        backend.save("v", "k", Vec::<String>::new(), Lifetime::Seconds(10)).await.unwrap();

        clock.advance(9);
        assert_eq!(backend.load("k", false).await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(backend.test("k").await.unwrap(), Some(START));

        clock.advance(1);
        assert_eq!(backend.load("k", false).await.unwrap(), None);
        assert_eq!(backend.test("k").await.unwrap(), None);
        assert_eq!(backend.load("k", true).await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_default_lifetime() {
        let (backend, _) = backend();
        backend.save("v", "k", ["t"], Lifetime::Default).await.unwrap();
        let meta = backend.metadata("k").await.unwrap().unwrap();
        assert_eq!(meta.expire, START + DEFAULT_LIFETIME_SECS as i64);

        let backend = backend.default_lifetime(None);
        backend.save("v", "k", ["t"], Lifetime::Default).await.unwrap();
        assert_eq!(backend.metadata("k").await.unwrap().unwrap().expire, 0);
    }

    #[tokio::test]
    async fn test_save_replaces_not_merges() {
        let (backend, clock) = backend();
        backend.save("old", "k", ["a", "b"], Lifetime::Infinite).await.unwrap();
        clock.advance(5);
        backend.save("new", "k", ["c"], Lifetime::Seconds(60)).await.unwrap();

        let meta = backend.metadata("k").await.unwrap().unwrap();
        assert_eq!(meta.tags, vec!["c".to_string()]);
        assert_eq!(meta.mtime, START + 5);
        assert_eq!(meta.expire, START + 65);
        assert_eq!(backend.load("k", false).await.unwrap(), Some(b"new".to_vec()));
        assert_eq!(backend.store().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let (backend, _) = backend();
        backend.save("v", "bar", ["a"], Lifetime::Infinite).await.unwrap();
        backend.save("v", "bar2", ["a"], Lifetime::Infinite).await.unwrap();

        assert!(backend.remove("bar").await.unwrap());
        assert_eq!(backend.load("bar", false).await.unwrap(), None);
        assert!(!backend.remove("bar").await.unwrap());
        assert!(!backend.remove("barbar").await.unwrap());
        assert!(backend.test("bar2").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_touch_extends_expire() {
        let (backend, clock) = backend();
        backend.save("v", "k", ["a"], Lifetime::Seconds(30)).await.unwrap();
        let before = backend.metadata("k").await.unwrap().unwrap();

        clock.advance(3);
        assert!(backend.touch("k", 100).await.unwrap());

        let after = backend.metadata("k").await.unwrap().unwrap();
        assert_eq!(after.expire, before.expire + 100);
        assert_eq!(after.mtime, START + 3);
        assert_eq!(after.tags, before.tags);
        assert_eq!(backend.load("k", false).await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_touch_unknown_and_immortal() {
        let (backend, clock) = backend();
        assert!(!backend.touch("missing", 10).await.unwrap());

        backend.save("v", "k", ["a"], Lifetime::Infinite).await.unwrap();
        clock.advance(2);
        assert!(backend.touch("k", 10).await.unwrap());

        // Not 0 + 10: that would be a 1970 timestamp and read as stale.
        let meta = backend.metadata("k").await.unwrap().unwrap();
        assert_eq!((meta.expire, meta.mtime), (0, START + 2));
        assert!(backend.test("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_expire_now() {
        let (backend, _) = backend();
        backend.save("v", "k", ["a"], Lifetime::Infinite).await.unwrap();

        assert!(backend.expire_now("k").await.unwrap());
        assert_eq!(backend.load("k", false).await.unwrap(), None);
        assert_eq!(backend.load("k", true).await.unwrap(), Some(b"v".to_vec()));
        assert!(!backend.expire_now("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_now_does_not_recreate_removed_entry() {
        let (backend, clock) = backend();
        backend.save("v", "k", ["a", "b"], Lifetime::Infinite).await.unwrap();
        clock.advance(5);

        assert!(backend.expire_now("k").await.unwrap());
        let meta = backend.metadata("k").await.unwrap().unwrap();
        assert_eq!((meta.expire, meta.mtime), (START + 4, START + 5));
        assert_eq!(meta.tags, vec!["a".to_string(), "b".to_string()]);

        assert!(backend.remove("k").await.unwrap());
        assert!(!backend.expire_now("k").await.unwrap());
        assert!(backend.store().is_empty());
    }

    #[tokio::test]
    async fn test_empty_id_is_rejected() {
        let (backend, _) = backend();

        let err = backend.save("v", "", ["a"], Lifetime::Infinite).await.unwrap_err();
        assert!(err.is_validation());
        assert!(backend.load("", false).await.unwrap_err().is_validation());
        assert!(backend.remove("").await.unwrap_err().is_validation());
    }
}
