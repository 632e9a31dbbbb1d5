//! Error types for the cache backend.
//!
//! A missing or expired entry is never an error: lookups return `Option`.

use thiserror::Error;

/// Result alias used across the library.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Failures surfaced by the backend and its storage collaborators.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Caller or configuration error, reported immediately and never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The MongoDB driver rejected or could not complete a call.
    #[error("storage collaborator failed: {0}")]
    Collaborator(#[from] mongodb::error::Error),

    /// A non-MongoDB collaborator could not complete a call.
    #[error("storage collaborator unavailable: {0}")]
    Unavailable(String),

    /// A clean pass stopped after deleting only part of its selection.
    ///
    /// Deletion is idempotent, so re-running the same clean is safe.
    #[error("clean pass removed {deleted} of {matched} selected entries: {source}")]
    PartialInvalidation {
        deleted: usize,
        matched: usize,
        #[source]
        source: Box<CacheError>,
    },
}

impl CacheError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error is a caller/configuration mistake.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
