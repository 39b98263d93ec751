//! Matcher configuration.
//!
//! Loaded from an optional JSON file; every field has a default so a partial
//! file (or none at all) is valid. Match semantics (floors, overlap thresholds,
//! tolerances) are constants in `scoring`, not configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collector::CollectOptions;
use crate::models::QualityTier;
use crate::retry::{BackoffPolicy, RetryConfig};
use crate::source::MAX_QUERY_CHARS;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("quality ceiling must be between 1 and 4, got {0}")]
    InvalidCeiling(u8),

    #[error("batch_workers must be at least 1")]
    NoWorkers,

    #[error("cache_capacity must be at least 1")]
    NoCache,

    #[error("max_query_chars must be at least 1")]
    NoQueryRoom,

    #[error("retry jitter range is inverted ({min} > {max})")]
    InvertedJitter { min: f64, max: f64 },

    #[error("retry growth must be a positive number, got {0}")]
    InvalidGrowth(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Highest acceptable rendition, as a tier level (1 = LOW .. 4 = DOLBY_ATMOS)
    pub quality_ceiling: u8,
    /// Entries kept per memoized adapter operation
    pub cache_capacity: usize,
    pub max_query_chars: usize,
    /// Threads resolving tracks of a batch in parallel
    pub batch_workers: usize,
    pub retry: RetryConfig,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            quality_ceiling: QualityTier::HiResLossless.level(),
            cache_capacity: 256,
            max_query_chars: MAX_QUERY_CHARS,
            batch_workers: 5,
            retry: RetryConfig::default(),
        }
    }
}

impl MatcherConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config: Self =
            serde_json::from_str(&text).with_context(|| format!("Failed to parse config {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if QualityTier::from_level(self.quality_ceiling).is_none() {
            return Err(ConfigError::InvalidCeiling(self.quality_ceiling));
        }
        if self.batch_workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.cache_capacity == 0 {
            return Err(ConfigError::NoCache);
        }
        if self.max_query_chars == 0 {
            return Err(ConfigError::NoQueryRoom);
        }
        if self.retry.jitter_min > self.retry.jitter_max {
            return Err(ConfigError::InvertedJitter {
                min: self.retry.jitter_min,
                max: self.retry.jitter_max,
            });
        }
        if !(self.retry.growth.is_finite() && self.retry.growth > 0.0) {
            return Err(ConfigError::InvalidGrowth(self.retry.growth));
        }
        Ok(())
    }

    pub fn ceiling(&self) -> std::result::Result<QualityTier, ConfigError> {
        QualityTier::from_level(self.quality_ceiling).ok_or(ConfigError::InvalidCeiling(self.quality_ceiling))
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::from(&self.retry)
    }

    pub fn collect_options(&self) -> CollectOptions {
        CollectOptions {
            max_query_chars: self.max_query_chars,
        }
    }
}
