//! Rate-limit backoff around adapter calls.
//!
//! A "too many requests" signal (`SourceError::RateLimited`) is retried with
//! exponential backoff plus random jitter, up to a fixed retry ceiling. Any other
//! error returns immediately. Backoff state lives in the calling stack frame;
//! concurrent calls back off independently.

use std::thread;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::{AlbumRef, CandidateRecord, LibraryAlbum, LibraryItem};
use crate::source::{CandidateSource, LibrarySource, SourceError, SourceResult};

/// Longest single sleep, however many retries are configured.
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(600);

/// Exponential backoff schedule: `unit * (growth^n + jitter)` before retry `n`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub growth: f64,
    pub unit: Duration,
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 7,
            growth: 1.5,
            unit: Duration::from_secs(1),
            jitter_min: 0.1,
            jitter_max: 0.4,
        }
    }
}

impl BackoffPolicy {
    /// Policy that never sleeps.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            unit: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Sleep before retry number `retry` (1-based), with jitter drawn fresh.
    pub fn delay(&self, retry: u32) -> Duration {
        let jitter = if self.jitter_max > self.jitter_min {
            rand::thread_rng().gen_range(self.jitter_min..self.jitter_max)
        } else {
            self.jitter_min
        };
        self.delay_with_jitter(retry, jitter)
    }

    /// Delay for retry number `retry`, capped at `MAX_BACKOFF_DELAY`.
    pub fn delay_with_jitter(&self, retry: u32, jitter: f64) -> Duration {
        let factor = self.growth.powi(retry.min(i32::MAX as u32) as i32) + jitter;
        if self.unit.is_zero() || factor.is_nan() || factor <= 0.0 {
            return Duration::ZERO;
        }
        // An overflowing or infinite product falls back to the cap
        Duration::try_from_secs_f64(self.unit.as_secs_f64() * factor)
            .map_or(MAX_BACKOFF_DELAY, |delay| delay.min(MAX_BACKOFF_DELAY))
    }

    /// Run `operation`, backing off on rate limits.
    ///
    /// Returns `RateLimitExceeded` once `max_retries` retries have all been
    /// rate limited. The counter is explicit; there is no recursion.
    pub fn run<T>(
        &self,
        operation_name: &str,
        mut operation: impl FnMut() -> SourceResult<T>,
    ) -> SourceResult<T> {
        let mut retries = 0u32;

        loop {
            match operation() {
                Ok(value) => {
                    if retries > 0 {
                        tracing::debug!(operation = operation_name, retries, "Succeeded after backoff");
                    }
                    return Ok(value);
                }
                Err(err) if !err.is_rate_limited() => return Err(err),
                Err(_) => {
                    if retries >= self.max_retries {
                        tracing::warn!(
                            operation = operation_name,
                            attempts = retries + 1,
                            "Rate limit retries exhausted"
                        );
                        return Err(SourceError::RateLimitExceeded { attempts: retries + 1 });
                    }

                    retries += 1;
                    let backoff = self.delay(retries);
                    tracing::debug!(
                        operation = operation_name,
                        retry = retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    if !backoff.is_zero() {
                        thread::sleep(backoff);
                    }
                }
            }
        }
    }
}

/// Serializable form of `BackoffPolicy` used in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub growth: f64,
    pub unit_ms: u64,
    pub jitter_min: f64,
    pub jitter_max: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = BackoffPolicy::default();
        Self {
            max_retries: policy.max_retries,
            growth: policy.growth,
            unit_ms: policy.unit.as_millis() as u64,
            jitter_min: policy.jitter_min,
            jitter_max: policy.jitter_max,
        }
    }
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            growth: config.growth,
            unit: Duration::from_millis(config.unit_ms),
            jitter_min: config.jitter_min,
            jitter_max: config.jitter_max,
        }
    }
}

// ============================================================================
// Retrying Adapter
// ============================================================================

/// Adapter decorator applying a `BackoffPolicy` to every call.
pub struct Retrying<S> {
    inner: S,
    policy: BackoffPolicy,
}

impl<S> Retrying<S> {
    pub fn new(inner: S, policy: BackoffPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }
}

impl<S: CandidateSource> CandidateSource for Retrying<S> {
    fn search_by_isrc(&self, isrc: &str) -> SourceResult<Vec<CandidateRecord>> {
        self.policy.run("search_by_isrc", || self.inner.search_by_isrc(isrc))
    }

    fn search_albums_by_barcode(&self, barcode: &str) -> SourceResult<Vec<AlbumRef>> {
        self.policy
            .run("search_albums_by_barcode", || self.inner.search_albums_by_barcode(barcode))
    }

    fn album_tracks(&self, album: &AlbumRef) -> SourceResult<Vec<CandidateRecord>> {
        self.policy.run("album_tracks", || self.inner.album_tracks(album))
    }

    fn search_by_text(&self, title: &str, artist: &str) -> SourceResult<Vec<CandidateRecord>> {
        self.policy
            .run("search_by_text", || self.inner.search_by_text(title, artist))
    }
}

impl<L: LibrarySource> LibrarySource for Retrying<L> {
    fn search_albums(&self, query: &str) -> SourceResult<Vec<LibraryAlbum>> {
        self.policy.run("search_albums", || self.inner.search_albums(query))
    }

    fn album_items(&self, album_id: &str) -> SourceResult<Vec<LibraryItem>> {
        self.policy.run("album_items", || self.inner.album_items(album_id))
    }

    fn search_items(&self, query: &str) -> SourceResult<Vec<LibraryItem>> {
        self.policy.run("search_items", || self.inner.search_items(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_delay_grows_exponentially() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_with_jitter(1, 0.0), Duration::from_millis(1500));
        assert_eq!(policy.delay_with_jitter(2, 0.0), Duration::from_millis(2250));
        assert!(policy.delay_with_jitter(3, 0.0) > policy.delay_with_jitter(2, 0.4));
    }

    #[test]
    fn test_delay_is_capped_for_large_retry_counts() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_with_jitter(120, 0.1), MAX_BACKOFF_DELAY);
        // growth^n overflows f64 here
        assert_eq!(policy.delay_with_jitter(5000, 0.1), MAX_BACKOFF_DELAY);
        assert_eq!(BackoffPolicy::immediate(5000).delay_with_jitter(5000, 0.1), Duration::ZERO);
    }

    #[test]
    fn test_delay_jitter_within_range() {
        let policy = BackoffPolicy::default();
        for _ in 0..50 {
            let delay = policy.delay(1).as_secs_f64();
            assert!(delay >= 1.6 - 1e-9 && delay < 1.9 + 1e-9, "delay {}", delay);
        }
    }

    #[test]
    fn test_succeeds_after_rate_limits() {
        let calls = Cell::new(0);
        let result = BackoffPolicy::immediate(7).run("test_op", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(SourceError::RateLimited)
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let calls = Cell::new(0);
        let result: SourceResult<()> = BackoffPolicy::immediate(7).run("test_op", || {
            calls.set(calls.get() + 1);
            Err(SourceError::RateLimited)
        });
        assert!(matches!(result, Err(SourceError::RateLimitExceeded { attempts: 8 })));
        assert_eq!(calls.get(), 8);
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: SourceResult<()> = BackoffPolicy::immediate(7).run("test_op", || {
            calls.set(calls.get() + 1);
            Err(SourceError::Malformed("bad json".to_string()))
        });
        assert!(matches!(result, Err(SourceError::Malformed(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_retry_config_round_trip() {
        let config = RetryConfig::default();
        let policy = BackoffPolicy::from(&config);
        assert_eq!(policy, BackoffPolicy::default());
    }
}
