//! Clean modes and the invalidation pass.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info, warn};

use super::CacheBackend;
use super::tags::{TagMatch, TagSelector};
use crate::clock::Clock;
use crate::database::{DocumentStore, Filter};
use crate::error::{CacheError, Result};

/// Which entries a clean pass removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CleanMode {
    /// Every entry; tags are ignored.
    #[default]
    All,
    /// Entries with a finite expiry in the past; tags are ignored.
    Old,
    /// Entries carrying all given tags.
    MatchingTag,
    /// Entries carrying none of the given tags.
    NotMatchingTag,
    /// Entries carrying at least one of the given tags.
    MatchingAnyTag,
}

impl CleanMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Old => "old",
            Self::MatchingTag => "matchingTag",
            Self::NotMatchingTag => "notMatchingTag",
            Self::MatchingAnyTag => "matchingAnyTag",
        }
    }

    /// Tag combinator for tag-based modes.
    pub fn tag_match(&self) -> Option<TagMatch> {
        match self {
            Self::All | Self::Old => None,
            Self::MatchingTag => Some(TagMatch::All),
            Self::NotMatchingTag => Some(TagMatch::None),
            Self::MatchingAnyTag => Some(TagMatch::Any),
        }
    }
}

impl fmt::Display for CleanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CleanMode {
    type Err = CacheError;

    /// Accepts `matchingAnyTag`, `matching_any_tag` and any casing of either.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "all" => Ok(Self::All),
            "old" => Ok(Self::Old),
            "matchingtag" => Ok(Self::MatchingTag),
            "notmatchingtag" => Ok(Self::NotMatchingTag),
            "matchinganytag" => Ok(Self::MatchingAnyTag),
            _ => Err(CacheError::validation(format!("unknown clean mode '{s}'"))),
        }
    }
}

/// Outcome of a completed clean pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanReport {
    pub mode: CleanMode,
    /// Entries actually deleted by this pass.
    pub removed: u64,
}

impl<S: DocumentStore, C: Clock> CacheBackend<S, C> {
    /// Remove the entries selected by `mode`.
    ///
    /// Tag-based modes select ids first (stale entries included) and then
    /// delete them one by one; an id that vanished in between is skipped.
    /// There is no rollback: a collaborator failure after some deletions
    /// yields `CacheError::PartialInvalidation`, and re-running is safe.
    ///
    /// # Errors
    /// Returns a validation error for a tag-based mode with no tags.
    pub async fn clean<I, T>(&self, mode: CleanMode, tags: I) -> Result<CleanReport>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let Some(tag_match) = mode.tag_match() else {
            let filter = match mode {
                CleanMode::Old => Filter::expired_before(self.now()),
                _ => Filter::Everything,
            };
            let removed = self.store.delete_many(&filter).await?;
            info!("Clean {}: removed {} entries", mode, removed);
            return Ok(CleanReport { mode, removed });
        };

        let selector = TagSelector::new(tag_match, tags)?;
        let ids = self.select_ids(&selector, false).await?;
        let removed = self.delete_each(&ids).await?;

        info!("Clean {} {:?}: removed {} entries", mode, selector.tags(), removed);
        Ok(CleanReport { mode, removed })
    }

    async fn delete_each(&self, ids: &[String]) -> Result<u64> {
        let mut removed = 0u64;

        for id in ids {
            match self.store.delete_one(id).await {
                Ok(true) => removed += 1,
                Ok(false) => debug!("Clean skipped vanished id={}", id),
                Err(e) if removed == 0 => return Err(e),
                Err(e) => {
                    warn!("Clean failed after {} of {} deletions: {}", removed, ids.len(), e);
                    return Err(CacheError::PartialInvalidation {
                        deleted: removed as usize,
                        matched: ids.len(),
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(removed)
    }
}
