//! Similarity scoring for cross-catalog matching.
//!
//! This module contains the pure comparison primitives:
//! - Bag-of-words overlap for titles, albums and artists
//! - Numeric closeness for durations
//! - The five-criterion matching score used to gate and rank candidates

use rustc_hash::{FxHashMap, FxHashSet};

use crate::models::{CandidateRecord, ReferenceTrack};
use crate::normalize::{normalize_artist, split_all_artists, tokenize};

// ============================================================================
// Score Thresholds
// ============================================================================

/// Minimum matching score for a candidate to be eligible at all (out of 5.0)
pub const CONFIDENCE_FLOOR: f64 = 3.5;

/// Durations within this many seconds count as the same recording
pub const DURATION_TOLERANCE_SECS: f64 = 2.0;

/// Title overlap must exceed this
pub const TITLE_OVERLAP_THRESHOLD: f64 = 0.7;

/// Album overlap must exceed this (editions vary a lot across catalogs)
pub const ALBUM_OVERLAP_THRESHOLD: f64 = 0.35;

/// Album-scoped candidates need this many of title, album, artists and duration to short-circuit
pub const ALBUM_CRITERIA_MIN: usize = 4;

/// Overlap required by the existence resolver for titles, albums and artists
pub const LIBRARY_OVERLAP_THRESHOLD: f64 = 0.66;

/// Destination libraries re-encode audio, so durations drift a little more
pub const LIBRARY_DURATION_TOLERANCE_SECS: f64 = 3.0;

// ============================================================================
// Criterion Weights
// ============================================================================

pub const DURATION_POINTS: f64 = 1.0;
pub const ISRC_POINTS: f64 = 0.5;
pub const TITLE_POINTS: f64 = 1.0;
pub const ALBUM_POINTS: f64 = 1.5;
pub const ARTIST_POINTS: f64 = 1.0;

// ============================================================================
// Primitives
// ============================================================================

/// Multiset overlap of the token bags of `a` and `b`.
///
/// Sum of per-token minimum counts divided by the sum of per-token maximum
/// counts. Returns 0.0 if either side has no tokens.
pub fn weighted_word_overlap(a: &str, b: &str) -> f64 {
    let tokens_a = tokenize(a);
    let tokens_b = tokenize(b);
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return 0.0;
    }

    let count = |tokens: &[String]| {
        let mut bag: FxHashMap<String, usize> = FxHashMap::default();
        for token in tokens {
            *bag.entry(token.clone()).or_insert(0) += 1;
        }
        bag
    };
    let bag_a = count(&tokens_a);
    let bag_b = count(&tokens_b);

    let mut intersection = 0usize;
    let mut union = 0usize;
    for (token, &n_a) in &bag_a {
        let n_b = bag_b.get(token).copied().unwrap_or(0);
        intersection += n_a.min(n_b);
        union += n_a.max(n_b);
    }
    for (token, &n_b) in &bag_b {
        if !bag_a.contains_key(token) {
            union += n_b;
        }
    }

    intersection as f64 / union as f64
}

/// `|a - b| < tolerance`
pub fn numbers_close(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() < tolerance
}

/// True when every reference artist appears among the candidate's artists.
///
/// The candidate may credit extra (featured) artists. An empty reference list
/// covers nothing.
pub fn artists_covered<R: AsRef<str>, C: AsRef<str>>(reference: &[R], candidate: &[C]) -> bool {
    // Either side may join several names in one credit ("A & B")
    let wanted = split_all_artists(reference);
    if wanted.is_empty() {
        return false;
    }

    let mut available: FxHashSet<String> = split_all_artists(candidate).into_iter().collect();
    available.extend(candidate.iter().map(|a| normalize_artist(a.as_ref())));

    wanted.iter().all(|artist| available.contains(artist))
}

// ============================================================================
// Matching Score
// ============================================================================

/// Which of the five criteria a candidate satisfied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreBreakdown {
    pub duration: bool,
    pub isrc: bool,
    pub title: bool,
    pub album: bool,
    pub artists: bool,
}

impl ScoreBreakdown {
    /// Weighted score on the 0.0-5.0 scale.
    pub fn total(&self) -> f64 {
        let mut score = 0.0;
        if self.duration {
            score += DURATION_POINTS;
        }
        if self.isrc {
            score += ISRC_POINTS;
        }
        if self.title {
            score += TITLE_POINTS;
        }
        if self.album {
            score += ALBUM_POINTS;
        }
        if self.artists {
            score += ARTIST_POINTS;
        }
        score
    }

    /// Unweighted number of satisfied criteria (0-5).
    pub fn criteria_count(&self) -> usize {
        [self.duration, self.isrc, self.title, self.album, self.artists]
            .iter()
            .filter(|&&hit| hit)
            .count()
    }

    /// Satisfied criteria among title, album, artists and duration (0-4).
    ///
    /// ISRC is left out: an album-scoped hit is confirmed by its surroundings.
    pub fn album_scoped_count(&self) -> usize {
        [self.duration, self.title, self.album, self.artists]
            .iter()
            .filter(|&&hit| hit)
            .count()
    }

    pub fn is_confident(&self) -> bool {
        self.total() >= CONFIDENCE_FLOOR
    }
}

/// Evaluate each criterion of `candidate` against `reference`.
///
/// Missing fields never fail: an unknown duration or an absent ISRC simply
/// earns no points for that criterion.
pub fn score_breakdown(reference: &ReferenceTrack, candidate: &CandidateRecord) -> ScoreBreakdown {
    // STEP 1: duration, only when both sides know it
    let duration = reference.has_duration()
        && candidate.duration > 0.0
        && numbers_close(reference.duration, candidate.duration, DURATION_TOLERANCE_SECS);

    // STEP 2: ISRC, case-insensitive and only if both present
    let isrc = match (reference.isrc(), candidate.isrc.as_deref().map(str::trim)) {
        (Some(a), Some(b)) if !b.is_empty() => a.eq_ignore_ascii_case(b),
        _ => false,
    };

    // STEP 3: text criteria
    let title = weighted_word_overlap(&reference.title, &candidate.title) > TITLE_OVERLAP_THRESHOLD;
    let album = weighted_word_overlap(&reference.album, &candidate.album) > ALBUM_OVERLAP_THRESHOLD;
    let artists = artists_covered(&reference.artists, &candidate.artists);

    ScoreBreakdown { duration, isrc, title, album, artists }
}

/// Weighted matching score (0.0-5.0) of `candidate` against `reference`.
pub fn matching_score(reference: &ReferenceTrack, candidate: &CandidateRecord) -> f64 {
    score_breakdown(reference, candidate).total()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numb_reference() -> ReferenceTrack {
        ReferenceTrack::new("Numb", &["Linkin Park"], "Meteora", 185.0).with_isrc("USWB10200123")
    }

    fn numb_candidate() -> CandidateRecord {
        CandidateRecord {
            id: "t1".to_string(),
            title: "Numb".to_string(),
            artists: vec!["Linkin Park".to_string()],
            album: "Meteora (Remastered)".to_string(),
            duration: 186.0,
            isrc: Some("uswb10200123".to_string()),
            quality: "LOSSLESS".to_string(),
        }
    }

    #[test]
    fn test_overlap_identity() {
        for s in ["Numb", "Song of the Year", "a a b", "Björk"] {
            assert_eq!(weighted_word_overlap(s, s), 1.0);
        }
    }

    #[test]
    fn test_overlap_disjoint_and_empty() {
        assert_eq!(weighted_word_overlap("red house", "blue door"), 0.0);
        assert_eq!(weighted_word_overlap("", "anything"), 0.0);
        assert_eq!(weighted_word_overlap("anything", ""), 0.0);
        assert_eq!(weighted_word_overlap("", ""), 0.0);
    }

    #[test]
    fn test_overlap_counts_multiplicity() {
        // bag {a:2, b:1} vs {a:1, b:1}: min 2, max 3
        let score = weighted_word_overlap("a a b", "a b");
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
        // Word order is irrelevant
        assert_eq!(weighted_word_overlap("one two", "two one"), 1.0);
    }

    #[test]
    fn test_overlap_partial() {
        assert_eq!(weighted_word_overlap("Song (Live)", "Song"), 0.5);
        assert_eq!(weighted_word_overlap("Meteora (Remastered)", "Meteora"), 1.0);
    }

    #[test]
    fn test_numbers_close_symmetric() {
        let pairs = [(185.0, 186.0), (185.0, 187.0), (0.0, -1.5), (10.0, 12.5)];
        for (a, b) in pairs {
            assert_eq!(numbers_close(a, b, 2.0), numbers_close(b, a, 2.0));
        }
        assert!(numbers_close(185.0, 186.9, 2.0));
        assert!(!numbers_close(185.0, 187.0, 2.0));
    }

    #[test]
    fn test_artists_covered() {
        assert!(artists_covered(&["Linkin Park"], &["Linkin Park", "Jay-Z"]));
        assert!(artists_covered(&["Simon", "Garfunkel"], &["Simon & Garfunkel"]));
        assert!(artists_covered(&["Simon & Garfunkel"], &["Simon", "Garfunkel"]));
        assert!(artists_covered(&["Earth, Wind & Fire"], &["Earth, Wind & Fire"]));
        assert!(!artists_covered(&["Simon & Garfunkel"], &["Paul Simon"]));
        assert!(artists_covered(&["Sigur Rós"], &["sigur ros"]));
        assert!(!artists_covered(&["Linkin Park", "Jay-Z"], &["Linkin Park"]));
        assert!(!artists_covered::<&str, &str>(&[], &["Linkin Park"]));
    }

    #[test]
    fn test_full_score_breakdown() {
        let breakdown = score_breakdown(&numb_reference(), &numb_candidate());
        assert!(breakdown.duration);
        assert!(breakdown.isrc);
        assert!(breakdown.title);
        assert!(breakdown.album);
        assert!(breakdown.artists);
        assert_eq!(breakdown.total(), 5.0);
        assert_eq!(breakdown.criteria_count(), 5);
        assert_eq!(breakdown.album_scoped_count(), 4);
        assert!(breakdown.is_confident());
    }

    #[test]
    fn test_missing_isrc_costs_exactly_half_a_point() {
        let reference = numb_reference();
        let mut candidate = numb_candidate();
        let with_isrc = matching_score(&reference, &candidate);
        candidate.isrc = None;
        let without_isrc = matching_score(&reference, &candidate);
        assert_eq!(with_isrc - without_isrc, ISRC_POINTS);
        assert!(without_isrc >= CONFIDENCE_FLOOR);
    }

    #[test]
    fn test_score_is_monotonic_in_criteria() {
        let reference = numb_reference();
        let mut candidate = numb_candidate();
        candidate.duration = 300.0;
        candidate.isrc = None;
        let before = matching_score(&reference, &candidate);
        candidate.duration = 185.5;
        let after = matching_score(&reference, &candidate);
        assert!(after > before);
        assert_eq!(after - before, DURATION_POINTS);
    }

    #[test]
    fn test_unknown_duration_earns_nothing() {
        let mut reference = numb_reference();
        reference.duration = 0.0;
        let mut candidate = numb_candidate();
        candidate.duration = 0.0;
        assert!(!score_breakdown(&reference, &candidate).duration);
    }

    #[test]
    fn test_wrong_song_is_below_floor() {
        let reference = numb_reference();
        let candidate = CandidateRecord {
            id: "t2".to_string(),
            title: "In the End".to_string(),
            artists: vec!["Linkin Park".to_string()],
            album: "Hybrid Theory".to_string(),
            duration: 216.0,
            isrc: Some("USWB10002407".to_string()),
            quality: "LOSSLESS".to_string(),
        };
        let breakdown = score_breakdown(&reference, &candidate);
        assert_eq!(breakdown.total(), ARTIST_POINTS);
        assert!(!breakdown.is_confident());
    }
}
