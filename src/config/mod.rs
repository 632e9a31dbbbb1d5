//! Configuration module for the cache backend.
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::backend::CleanMode;
use crate::error::{CacheError, Result};

/// Default lifetime applied when a save does not override it.
pub const DEFAULT_LIFETIME_SECS: u64 = 3600;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    // MongoDB
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub collection: String,

    /// Default entry lifetime in seconds (`None` = entries never expire)
    pub default_lifetime: Option<u64>,

    // Sweeper
    pub clean_mode: CleanMode,
    pub clean_tags: Vec<String>,
    /// Repeat the clean pass at this interval instead of running once.
    pub sweep_interval: Option<Duration>,
}

impl Config {
    /// Load configuration from the process environment (and `.env`).
    ///
    /// # Errors
    /// Returns a validation error if a required variable is unset or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mongodb_database = var("MONGODB_DATABASE")
            .ok_or_else(|| CacheError::validation("MONGODB_DATABASE must be set"))?;
        let collection = var("CACHE_COLLECTION")
            .ok_or_else(|| CacheError::validation("CACHE_COLLECTION must be set"))?;

        let default_lifetime = match var("CACHE_LIFETIME") {
            None => Some(DEFAULT_LIFETIME_SECS),
            Some(v) if v.eq_ignore_ascii_case("infinite") => None,
            Some(v) => Some(v.parse::<u64>().map_err(|_| {
                CacheError::validation(format!(
                    "CACHE_LIFETIME must be seconds or 'infinite', got '{v}'"
                ))
            })?),
        };

        let clean_mode = match var("CLEAN_MODE") {
            Some(v) => v.parse::<CleanMode>()?,
            None => CleanMode::Old,
        };

        // Parse clean tags (comma-separated)
        let clean_tags: Vec<String> = var("CLEAN_TAGS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if clean_mode.tag_match().is_some() && clean_tags.is_empty() {
            return Err(CacheError::validation(format!(
                "CLEAN_TAGS must be set for clean mode {clean_mode}"
            )));
        }

        let sweep_interval = match var("SWEEP_INTERVAL_SECS") {
            None => None,
            Some(v) => {
                let secs = v.parse::<u64>().ok().filter(|s| *s > 0).ok_or_else(|| {
                    CacheError::validation(format!(
                        "SWEEP_INTERVAL_SECS must be a positive integer, got '{v}'"
                    ))
                })?;
                Some(Duration::from_secs(secs))
            }
        };

        Ok(Self {
            mongodb_uri: var("MONGODB_URI")
                .unwrap_or_else(|| "mongodb://localhost:27017".to_string()),
            mongodb_database,
            collection,
            default_lifetime,
            clean_mode,
            clean_tags,
            sweep_interval,
        })
    }
}
