//! Adapter seams to the remote catalogs.
//!
//! `CandidateSource` is the download-source catalog searched for renditions,
//! `LibrarySource` the destination library checked for existing copies. Both are
//! plain blocking traits; retrying and memoization are layered on top by
//! `retry::Retrying` and `cache::Cached`.

use thiserror::Error;

use crate::models::{AlbumRef, CandidateRecord, LibraryAlbum, LibraryItem};

/// Failure reported by an adapter call.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The remote service asked us to slow down (HTTP 429 or equivalent).
    #[error("rate limited by remote catalog")]
    RateLimited,

    /// Backoff gave up.
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("catalog database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("catalog snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl SourceError {
    /// Transient signal that the retry layer should back off and try again.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SourceError::RateLimited)
    }

    /// Errors that must reach the caller instead of degrading to "no results".
    pub fn is_terminal(&self) -> bool {
        matches!(self, SourceError::RateLimited | SourceError::RateLimitExceeded { .. })
    }
}

pub type SourceResult<T> = Result<T, SourceError>;

/// Download-source catalog queried for candidate renditions.
pub trait CandidateSource: Send + Sync {
    fn search_by_isrc(&self, isrc: &str) -> SourceResult<Vec<CandidateRecord>>;

    fn search_albums_by_barcode(&self, barcode: &str) -> SourceResult<Vec<AlbumRef>>;

    fn album_tracks(&self, album: &AlbumRef) -> SourceResult<Vec<CandidateRecord>>;

    fn search_by_text(&self, title: &str, artist: &str) -> SourceResult<Vec<CandidateRecord>>;
}

/// Destination library checked before downloading.
pub trait LibrarySource: Send + Sync {
    fn search_albums(&self, query: &str) -> SourceResult<Vec<LibraryAlbum>>;

    fn album_items(&self, album_id: &str) -> SourceResult<Vec<LibraryItem>>;

    fn search_items(&self, query: &str) -> SourceResult<Vec<LibraryItem>>;
}

impl<S: CandidateSource + ?Sized> CandidateSource for &S {
    fn search_by_isrc(&self, isrc: &str) -> SourceResult<Vec<CandidateRecord>> {
        (**self).search_by_isrc(isrc)
    }

    fn search_albums_by_barcode(&self, barcode: &str) -> SourceResult<Vec<AlbumRef>> {
        (**self).search_albums_by_barcode(barcode)
    }

    fn album_tracks(&self, album: &AlbumRef) -> SourceResult<Vec<CandidateRecord>> {
        (**self).album_tracks(album)
    }

    fn search_by_text(&self, title: &str, artist: &str) -> SourceResult<Vec<CandidateRecord>> {
        (**self).search_by_text(title, artist)
    }
}

impl<L: LibrarySource + ?Sized> LibrarySource for &L {
    fn search_albums(&self, query: &str) -> SourceResult<Vec<LibraryAlbum>> {
        (**self).search_albums(query)
    }

    fn album_items(&self, album_id: &str) -> SourceResult<Vec<LibraryItem>> {
        (**self).album_items(album_id)
    }

    fn search_items(&self, query: &str) -> SourceResult<Vec<LibraryItem>> {
        (**self).search_items(query)
    }
}

/// Default cap on free-text query length, in characters.
pub const MAX_QUERY_CHARS: usize = 100;

/// Truncate a query to at most `max_chars` characters, on a char boundary.
pub fn cap_query(query: &str, max_chars: usize) -> String {
    let trimmed = query.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((cut, _)) => trimmed[..cut].trim_end().to_string(),
        None => trimmed.to_string(),
    }
}

/// "title artist" free-text query, capped to `max_chars`.
pub fn text_query(title: &str, artist: &str, max_chars: usize) -> String {
    let joined = format!("{} {}", title.trim(), artist.trim());
    cap_query(&joined, max_chars)
}
