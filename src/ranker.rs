//! Best-match selection under a quality ceiling.
//!
//! Scoring wraps each candidate in a `ScoredCandidate`; the records themselves are
//! never touched. Selection then runs in three steps:
//!
//! 1. Album short-circuit: an album-scoped candidate that confirms the title and
//!    at least `ALBUM_CRITERIA_MIN` of title, album, artists and duration, at
//!    exactly the ceiling tier, wins immediately.
//! 2. Tier selection: among candidates at or above the confidence floor, keep the
//!    highest tier not exceeding the ceiling.
//! 3. Within that tier, highest score wins; ties go to the more reliable search
//!    strategy, then to the lowest candidate id.

use std::cmp::Ordering;

use crate::models::{CandidateBatch, MatchResult, QualityTier, ReferenceTrack, ScoredCandidate, SearchKind};
use crate::scoring::{score_breakdown, ALBUM_CRITERIA_MIN};

/// Score every candidate of every batch, in batch order.
pub fn score_candidates<'a>(
    batches: &'a [CandidateBatch],
    reference: &ReferenceTrack,
) -> Vec<ScoredCandidate<'a>> {
    batches
        .iter()
        .flat_map(|batch| {
            batch.candidates.iter().map(move |candidate| {
                let breakdown = score_breakdown(reference, candidate);
                ScoredCandidate {
                    candidate,
                    kind: batch.kind,
                    breakdown,
                    score: breakdown.total(),
                    tier: candidate.tier(),
                }
            })
        })
        .collect()
}

/// Pick the best candidate for `reference` not exceeding `ceiling`, or `None`.
pub fn select_best(
    batches: &[CandidateBatch],
    reference: &ReferenceTrack,
    ceiling: QualityTier,
) -> Option<MatchResult> {
    let scored = score_candidates(batches, reference);

    if let Some(winner) = album_short_circuit(&scored, ceiling) {
        let mut result = MatchResult::from(winner);
        result.short_circuit = true;
        return Some(result);
    }

    let eligible: Vec<&ScoredCandidate> = scored
        .iter()
        .filter(|s| s.breakdown.is_confident() && s.tier <= ceiling)
        .collect();

    let best_tier = eligible.iter().map(|s| s.tier).max()?;

    eligible
        .into_iter()
        .filter(|s| s.tier == best_tier)
        .max_by(|a, b| rank_order(a, b))
        .map(MatchResult::from)
}

/// Album-scoped candidate confirmed strongly enough to end the search.
fn album_short_circuit<'s, 'a>(
    scored: &'s [ScoredCandidate<'a>],
    ceiling: QualityTier,
) -> Option<&'s ScoredCandidate<'a>> {
    scored
        .iter()
        .filter(|s| {
            s.kind == SearchKind::Album
                && s.tier == ceiling
                && s.breakdown.title
                && s.breakdown.album_scoped_count() >= ALBUM_CRITERIA_MIN
        })
        .max_by(|a, b| rank_order(a, b))
}

/// Total order used for "best": greater is better.
fn rank_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    a.score
        .total_cmp(&b.score)
        // Lower SearchKind is more reliable, lower id wins a full tie
        .then_with(|| b.kind.cmp(&a.kind))
        .then_with(|| b.candidate.id.cmp(&a.candidate.id))
}
