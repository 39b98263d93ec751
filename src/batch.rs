//! Playlist-level resolution.
//!
//! Each reference is first checked against the destination library (when one is
//! given) and only looked up in the download source if it is missing there.
//! Tracks are processed on a dedicated rayon pool; outcomes come back in input
//! order regardless of completion order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::existence::ExistenceResolver;
use crate::models::{MatchResult, QualityTier, ReferenceTrack, ResolutionStats};
use crate::progress::log_progress;
use crate::resolver::TrackResolver;
use crate::source::{CandidateSource, LibrarySource};

/// Print a log-only progress line every this many tracks.
const LOG_INTERVAL: u64 = 25;

/// What happened to one reference track.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    /// Already in the destination library
    Present { library_id: String },
    Matched(MatchResult),
    NoMatch,
    /// Rate limiting gave up on this track
    Failed { error: String },
}

impl BatchOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            BatchOutcome::Present { .. } => "present",
            BatchOutcome::Matched(_) => "matched",
            BatchOutcome::NoMatch => "no_match",
            BatchOutcome::Failed { .. } => "failed",
        }
    }
}

/// Resolve every reference on a pool of `workers` threads.
pub fn resolve_batch<S, L>(
    resolver: &TrackResolver<S>,
    library: Option<&ExistenceResolver<L>>,
    references: &[ReferenceTrack],
    ceiling: QualityTier,
    workers: usize,
    progress: &ProgressBar,
) -> Result<(Vec<BatchOutcome>, ResolutionStats)>
where
    S: CandidateSource,
    L: LibrarySource,
{
    let start = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .context("Failed to build resolution thread pool")?;

    let total = references.len() as u64;
    let done = AtomicU64::new(0);

    let outcomes: Vec<BatchOutcome> = pool.install(|| {
        references
            .par_iter()
            .map(|reference| {
                let outcome = resolve_one(resolver, library, reference, ceiling);
                progress.inc(1);
                let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                log_progress("RESOLVE", current, total, LOG_INTERVAL);
                outcome
            })
            .collect()
    });

    let stats = summarize(&outcomes, start.elapsed().as_secs_f64());
    tracing::info!(
        total = stats.total,
        present = stats.already_present,
        matched = stats.matched,
        no_match = stats.no_match,
        failed = stats.failed,
        "Batch resolved"
    );
    Ok((outcomes, stats))
}

fn resolve_one<S, L>(
    resolver: &TrackResolver<S>,
    library: Option<&ExistenceResolver<L>>,
    reference: &ReferenceTrack,
    ceiling: QualityTier,
) -> BatchOutcome
where
    S: CandidateSource,
    L: LibrarySource,
{
    if let Some(library) = library {
        match library.find(reference) {
            Ok(Some(item)) => return BatchOutcome::Present { library_id: item.id },
            Ok(None) => {}
            Err(err) => return BatchOutcome::Failed { error: err.to_string() },
        }
    }

    match resolver.resolve(reference, ceiling) {
        Ok(Some(result)) => BatchOutcome::Matched(result),
        Ok(None) => BatchOutcome::NoMatch,
        Err(err) => {
            tracing::warn!(reference = %reference.id, error = %err, "Resolution failed");
            BatchOutcome::Failed { error: err.to_string() }
        }
    }
}

/// Count outcomes into run statistics.
pub fn summarize(outcomes: &[BatchOutcome], elapsed_seconds: f64) -> ResolutionStats {
    let mut stats = ResolutionStats {
        total: outcomes.len(),
        elapsed_seconds,
        ..Default::default()
    };
    for outcome in outcomes {
        match outcome {
            BatchOutcome::Present { .. } => stats.already_present += 1,
            BatchOutcome::Matched(result) => stats.record_match(result),
            BatchOutcome::NoMatch => stats.no_match += 1,
            BatchOutcome::Failed { .. } => stats.failed += 1,
        }
    }
    stats
}
