//! Core data models for cross-catalog track matching.
//!
//! This module contains the value types that flow between the collector,
//! the ranker and the existence resolver. Records coming from a catalog are
//! never mutated: ranking wraps them in `ScoredCandidate` instead.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::scoring::ScoreBreakdown;

// ============================================================================
// Reference Track
// ============================================================================

/// Track whose identity we are trying to find in another catalog.
///
/// Built once at the playlist-catalog boundary and never re-validated while
/// scoring. A `duration` of zero or less means "unknown".
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTrack {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub isrc: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

impl ReferenceTrack {
    pub fn new(title: &str, artists: &[&str], album: &str, duration: f64) -> Self {
        Self {
            title: title.to_string(),
            artists: artists.iter().map(|a| a.to_string()).collect(),
            album: album.to_string(),
            duration,
            ..Self::default()
        }
    }

    /// Playlist catalogs report durations in milliseconds.
    pub fn duration_from_ms(ms: i64) -> f64 {
        ms as f64 / 1000.0
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_isrc(mut self, isrc: &str) -> Self {
        self.isrc = Some(isrc.to_string());
        self
    }

    pub fn with_barcode(mut self, barcode: &str) -> Self {
        self.barcode = Some(barcode.to_string());
        self
    }

    pub fn has_duration(&self) -> bool {
        self.duration > 0.0
    }

    /// First credited artist, used to build free-text queries.
    pub fn primary_artist(&self) -> &str {
        self.artists.first().map(String::as_str).unwrap_or("")
    }

    /// ISRC if present and non-blank.
    pub fn isrc(&self) -> Option<&str> {
        non_blank(self.isrc.as_deref())
    }

    /// Album barcode (UPC/EAN) if present and non-blank.
    pub fn barcode(&self) -> Option<&str> {
        non_blank(self.barcode.as_deref())
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

// ============================================================================
// Candidate Records
// ============================================================================

/// Track record returned by a download-source catalog.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub isrc: Option<String>,
    /// Raw quality tag as reported by the catalog (e.g. "HI_RES_LOSSLESS").
    #[serde(default)]
    pub quality: String,
}

impl CandidateRecord {
    pub fn tier(&self) -> QualityTier {
        QualityTier::from_tag(&self.quality)
    }
}

/// Album handle returned by a barcode lookup.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlbumRef {
    pub id: String,
    pub title: String,
}

// ============================================================================
// Quality Tiers
// ============================================================================

/// Rendition quality, totally ordered from worst to best.
///
/// Dolby Atmos sits at the top of the same ladder, so it can only be picked
/// when the caller's ceiling is `DolbyAtmos` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityTier {
    Low = 1,
    Lossless = 2,
    HiResLossless = 3,
    DolbyAtmos = 4,
}

impl QualityTier {
    pub const ALL: [QualityTier; 4] = [
        QualityTier::Low,
        QualityTier::Lossless,
        QualityTier::HiResLossless,
        QualityTier::DolbyAtmos,
    ];

    /// Map a catalog quality tag onto the ladder. Unknown tags rank lowest.
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_uppercase().replace(['-', ' '], "_").as_str() {
            "DOLBY_ATMOS" => QualityTier::DolbyAtmos,
            "HI_RES_LOSSLESS" | "HIRES_LOSSLESS" | "HI_RES" => QualityTier::HiResLossless,
            "LOSSLESS" | "MQA" => QualityTier::Lossless,
            _ => QualityTier::Low,
        }
    }

    /// Integer level used by configuration and the CLI (1..=4).
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(QualityTier::Low),
            2 => Some(QualityTier::Lossless),
            3 => Some(QualityTier::HiResLossless),
            4 => Some(QualityTier::DolbyAtmos),
            _ => None,
        }
    }

    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn as_tag(self) -> &'static str {
        match self {
            QualityTier::Low => "LOW",
            QualityTier::Lossless => "LOSSLESS",
            QualityTier::HiResLossless => "HI_RES_LOSSLESS",
            QualityTier::DolbyAtmos => "DOLBY_ATMOS",
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

// ============================================================================
// Search Results
// ============================================================================

/// Strategy that produced a list of candidates.
///
/// The declaration order is also the tie-break order: album-scoped results
/// are the most reliable, free text the least.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchKind {
    Album,
    Isrc,
    Text,
}

impl SearchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchKind::Album => "album",
            SearchKind::Isrc => "isrc",
            SearchKind::Text => "text",
        }
    }
}

/// Candidates returned by one search strategy.
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateBatch {
    pub kind: SearchKind,
    pub candidates: Vec<CandidateRecord>,
}

/// A candidate with its resolution-scoped score and tier.
#[derive(Clone, Debug)]
pub struct ScoredCandidate<'a> {
    pub candidate: &'a CandidateRecord,
    pub kind: SearchKind,
    pub breakdown: ScoreBreakdown,
    pub score: f64,
    pub tier: QualityTier,
}

/// Winning candidate of a resolution call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchResult {
    pub candidate: CandidateRecord,
    pub score: f64,
    pub tier: QualityTier,
    pub kind: SearchKind,
    /// True when an album-scoped candidate at exactly the ceiling tier ended the search.
    pub short_circuit: bool,
}

impl From<&ScoredCandidate<'_>> for MatchResult {
    fn from(scored: &ScoredCandidate<'_>) -> Self {
        Self {
            candidate: scored.candidate.clone(),
            score: scored.score,
            tier: scored.tier,
            kind: scored.kind,
            short_circuit: false,
        }
    }
}

// ============================================================================
// Destination Library Models
// ============================================================================

/// Album entry in the destination library.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryAlbum {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<String>,
}

/// Audio item in the destination library. Any field may be missing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryItem {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Per-run resolution counters, serialized for `--stats` output.
#[derive(Default, Debug, Clone, Serialize)]
pub struct ResolutionStats {
    pub total: usize,
    pub already_present: usize,
    pub matched: usize,
    pub no_match: usize,
    pub failed: usize,
    pub short_circuits: usize,

    pub matched_via_album: usize,
    pub matched_via_isrc: usize,
    pub matched_via_text: usize,

    pub tier_low: usize,
    pub tier_lossless: usize,
    pub tier_hi_res_lossless: usize,
    pub tier_dolby_atmos: usize,

    pub elapsed_seconds: f64,
}

impl ResolutionStats {
    /// Share of looked-up tracks (not already present) that found a match, in percent.
    pub fn match_rate(&self) -> f64 {
        let looked_up = self.total - self.already_present;
        if looked_up == 0 {
            0.0
        } else {
            100.0 * self.matched as f64 / looked_up as f64
        }
    }

    pub fn record_match(&mut self, result: &MatchResult) {
        self.matched += 1;
        if result.short_circuit {
            self.short_circuits += 1;
        }
        match result.kind {
            SearchKind::Album => self.matched_via_album += 1,
            SearchKind::Isrc => self.matched_via_isrc += 1,
            SearchKind::Text => self.matched_via_text += 1,
        }
        match result.tier {
            QualityTier::Low => self.tier_low += 1,
            QualityTier::Lossless => self.tier_lossless += 1,
            QualityTier::HiResLossless => self.tier_hi_res_lossless += 1,
            QualityTier::DolbyAtmos => self.tier_dolby_atmos += 1,
        }
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
