//! Tagcache - MongoDB cache backend with tag-based invalidation
//!
//! Stores opaque byte payloads keyed by id, with expiry and tags, behind a
//! caching façade that lives elsewhere.
//!
//! ## Architecture
//!
//! - `config` - Environment configuration
//! - `database` - Storage collaborators (MongoDB, in-memory) and the entry model
//! - `backend` - Entry store, tag queries, clean modes, capabilities
//! - `clock` - Time source for expiry arithmetic
//! - `error` - Error taxonomy
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tagcache::{CacheBackend, CleanMode, Lifetime, MongoStore};
//!
//! # async fn run() -> tagcache::Result<()> {
//! let store = MongoStore::connect("mongodb://localhost:27017", "zend_cache", "cache").await?;
//! let cache = CacheBackend::new(store);
//!
//! cache.save("payload", "article_42", ["news", "front"], Lifetime::Seconds(600)).await?;
//! let hit = cache.load("article_42", false).await?;
//! cache.clean(CleanMode::MatchingAnyTag, ["news"]).await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;

pub use backend::{
    CAPABILITIES, CacheBackend, Capabilities, CleanMode, CleanReport, Lifetime, TagMatch,
    TagSelector,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use database::{CacheEntry, DocumentStore, EntryMetadata, Filter, MemoryStore, MongoStore};
pub use error::{CacheError, Result};
