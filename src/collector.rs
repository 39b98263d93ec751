//! Concurrent candidate collection for one reference track.
//!
//! Up to three searches run side by side, one worker per strategy:
//! - ISRC lookup (when the reference carries one)
//! - Album lookup by barcode, then that album's track list
//! - Free text on title + primary artist, re-queried on looser title variants
//!
//! Results are gathered over a channel as each worker finishes. A strategy that
//! fails for any reason other than rate limiting contributes nothing; a rate-limit
//! failure is reported to the caller once every worker has returned.

use std::thread;

use crossbeam_channel::bounded;
use rustc_hash::FxHashSet;

use crate::models::{CandidateBatch, CandidateRecord, ReferenceTrack, SearchKind};
use crate::normalize::normalize_title;
use crate::source::{cap_query, CandidateSource, SourceError, SourceResult, MAX_QUERY_CHARS};

/// One worker per search strategy.
pub const COLLECTOR_WORKERS: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct CollectOptions {
    /// Cap on the combined "title artist" query length, in characters.
    pub max_query_chars: usize,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            max_query_chars: MAX_QUERY_CHARS,
        }
    }
}

/// Run every applicable strategy for `reference` and return the non-empty results.
///
/// Batches come back ordered by `SearchKind` with duplicate candidate ids removed
/// (the copy from the most reliable strategy is kept), so the output does not
/// depend on which worker finished first.
pub fn collect_candidates<S: CandidateSource>(
    source: &S,
    reference: &ReferenceTrack,
    options: &CollectOptions,
) -> SourceResult<Vec<CandidateBatch>> {
    let (tx, rx) = bounded::<(SearchKind, SourceResult<Vec<CandidateRecord>>)>(COLLECTOR_WORKERS);
    let mut batches = Vec::with_capacity(COLLECTOR_WORKERS);
    let mut terminal: Option<SourceError> = None;

    thread::scope(|scope| {
        if let Some(isrc) = reference.isrc() {
            let tx = tx.clone();
            scope.spawn(move || {
                let _ = tx.send((SearchKind::Isrc, source.search_by_isrc(isrc)));
            });
        }

        if let Some(barcode) = reference.barcode() {
            let tx = tx.clone();
            scope.spawn(move || {
                let _ = tx.send((SearchKind::Album, search_album(source, barcode)));
            });
        }

        {
            let tx = tx.clone();
            scope.spawn(move || {
                let _ = tx.send((SearchKind::Text, search_text(source, reference, options)));
            });
        }

        // Workers hold the remaining senders; the loop ends when the last one exits
        drop(tx);

        for (kind, result) in rx.iter() {
            match result {
                Ok(candidates) if !candidates.is_empty() => {
                    batches.push(CandidateBatch { kind, candidates });
                }
                Ok(_) => {}
                Err(err) if err.is_terminal() => {
                    tracing::warn!(strategy = kind.as_str(), error = %err, "Search aborted by rate limiting");
                    terminal.get_or_insert(err);
                }
                Err(err) => {
                    tracing::debug!(strategy = kind.as_str(), error = %err, "Search failed, treating as empty");
                }
            }
        }
    });

    if let Some(err) = terminal {
        return Err(err);
    }

    Ok(merge_batches(batches))
}

/// Barcode lookup followed by the first matching album's track list.
fn search_album<S: CandidateSource>(source: &S, barcode: &str) -> SourceResult<Vec<CandidateRecord>> {
    let albums = source.search_albums_by_barcode(barcode)?;
    match albums.first() {
        Some(album) => source.album_tracks(album),
        None => Ok(Vec::new()),
    }
}

/// Free-text search with fallback re-querying.
///
/// Only an empty raw result triggers the next variant: first the title cut at
/// its first " - ", then the title with parenthesized spans removed.
fn search_text<S: CandidateSource>(
    source: &S,
    reference: &ReferenceTrack,
    options: &CollectOptions,
) -> SourceResult<Vec<CandidateRecord>> {
    let variants = [
        reference.title.trim().to_string(),
        normalize_title(&reference.title, false, false, true),
        normalize_title(&reference.title, true, false, false),
    ];

    let mut tried: FxHashSet<String> = FxHashSet::default();
    for variant in variants {
        if variant.is_empty() || !tried.insert(variant.clone()) {
            continue;
        }

        let (title, artist) = capped_text_query(&variant, reference.primary_artist(), options.max_query_chars);
        let results = source.search_by_text(&title, &artist)?;
        if !results.is_empty() {
            return Ok(results);
        }
        tracing::debug!(query = %title, "Text search empty, trying looser title");
    }

    Ok(Vec::new())
}

/// Cap title and artist so "title artist" fits in `max_chars`. The title has priority.
pub fn capped_text_query(title: &str, artist: &str, max_chars: usize) -> (String, String) {
    let title = cap_query(title, max_chars);
    let room = max_chars.saturating_sub(title.chars().count() + 1);
    let artist = cap_query(artist, room);
    (title, artist)
}

/// Order batches by strategy reliability and drop repeated candidate ids.
fn merge_batches(mut batches: Vec<CandidateBatch>) -> Vec<CandidateBatch> {
    batches.sort_by_key(|batch| batch.kind);

    let mut seen: FxHashSet<String> = FxHashSet::default();
    batches
        .into_iter()
        .filter_map(|batch| {
            let candidates: Vec<CandidateRecord> = batch
                .candidates
                .into_iter()
                .filter(|c| seen.insert(c.id.clone()))
                .collect();
            (!candidates.is_empty()).then_some(CandidateBatch {
                kind: batch.kind,
                candidates,
            })
        })
        .collect()
}
