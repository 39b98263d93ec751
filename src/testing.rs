//! In-memory adapters shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use rustc_hash::FxHashMap;

use crate::models::{AlbumRef, CandidateRecord, LibraryAlbum, LibraryItem, ReferenceTrack};
use crate::source::{CandidateSource, LibrarySource, SourceError, SourceResult};

pub fn candidate(id: &str, title: &str, artist: &str, album: &str, duration: f64, quality: &str) -> CandidateRecord {
    CandidateRecord {
        id: id.to_string(),
        title: title.to_string(),
        artists: vec![artist.to_string()],
        album: album.to_string(),
        duration,
        isrc: None,
        quality: quality.to_string(),
    }
}

pub fn numb() -> ReferenceTrack {
    ReferenceTrack::new("Numb", &["Linkin Park"], "Meteora", 185.0)
        .with_id("sp-numb")
        .with_isrc("USWB10200123")
        .with_barcode("093624843025")
}

/// How a mocked operation should fail.
#[derive(Clone, Copy, Debug)]
pub enum Failure {
    NotFound,
    /// Rate limited this many times, then succeeds.
    RateLimited(usize),
    RateLimitedForever,
}

/// Scripted download-source catalog.
#[derive(Default)]
pub struct MockSource {
    pub by_isrc: FxHashMap<String, Vec<CandidateRecord>>,
    pub albums_by_barcode: FxHashMap<String, Vec<AlbumRef>>,
    pub album_tracks: FxHashMap<String, Vec<CandidateRecord>>,
    /// Keyed by exact title; the artist argument is recorded but not matched.
    pub by_title: FxHashMap<String, Vec<CandidateRecord>>,
    pub failures: FxHashMap<&'static str, Failure>,
    pub calls: AtomicUsize,
    pub rate_limit_hits: AtomicUsize,
    pub text_queries: Mutex<Vec<(String, String)>>,
}

impl MockSource {
    fn check(&self, operation: &'static str) -> SourceResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failures.get(operation) {
            None => Ok(()),
            Some(Failure::NotFound) => Err(SourceError::NotFound(operation.to_string())),
            Some(Failure::RateLimitedForever) => Err(SourceError::RateLimited),
            Some(Failure::RateLimited(times)) => {
                if self.rate_limit_hits.fetch_add(1, Ordering::SeqCst) < *times {
                    Err(SourceError::RateLimited)
                } else {
                    Ok(())
                }
            }
        }
    }

    pub fn text_queries(&self) -> Vec<(String, String)> {
        self.text_queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

impl CandidateSource for MockSource {
    fn search_by_isrc(&self, isrc: &str) -> SourceResult<Vec<CandidateRecord>> {
        self.check("isrc")?;
        Ok(self.by_isrc.get(isrc).cloned().unwrap_or_default())
    }

    fn search_albums_by_barcode(&self, barcode: &str) -> SourceResult<Vec<AlbumRef>> {
        self.check("barcode")?;
        Ok(self.albums_by_barcode.get(barcode).cloned().unwrap_or_default())
    }

    fn album_tracks(&self, album: &AlbumRef) -> SourceResult<Vec<CandidateRecord>> {
        self.check("album_tracks")?;
        Ok(self.album_tracks.get(&album.id).cloned().unwrap_or_default())
    }

    fn search_by_text(&self, title: &str, artist: &str) -> SourceResult<Vec<CandidateRecord>> {
        self.check("text")?;
        if let Ok(mut queries) = self.text_queries.lock() {
            queries.push((title.to_string(), artist.to_string()));
        }
        Ok(self.by_title.get(title).cloned().unwrap_or_default())
    }
}

/// Scripted destination library.
#[derive(Default)]
pub struct MockLibrary {
    pub albums: Vec<LibraryAlbum>,
    pub children: FxHashMap<String, Vec<LibraryItem>>,
    /// Keyed by exact query string.
    pub items_by_query: FxHashMap<String, Vec<LibraryItem>>,
    pub fail_items: bool,
    pub item_queries: Mutex<Vec<String>>,
}

impl MockLibrary {
    pub fn item_queries(&self) -> Vec<String> {
        self.item_queries.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

impl LibrarySource for MockLibrary {
    fn search_albums(&self, query: &str) -> SourceResult<Vec<LibraryAlbum>> {
        let wanted = query.to_lowercase();
        Ok(self
            .albums
            .iter()
            .filter(|a| wanted.contains(&a.name.to_lowercase()))
            .cloned()
            .collect())
    }

    fn album_items(&self, album_id: &str) -> SourceResult<Vec<LibraryItem>> {
        Ok(self.children.get(album_id).cloned().unwrap_or_default())
    }

    fn search_items(&self, query: &str) -> SourceResult<Vec<LibraryItem>> {
        if let Ok(mut queries) = self.item_queries.lock() {
            queries.push(query.to_string());
        }
        if self.fail_items {
            return Err(SourceError::Malformed("library offline".to_string()));
        }
        Ok(self.items_by_query.get(query).cloned().unwrap_or_default())
    }
}

pub fn item(id: &str, title: &str, artist: &str, album: Option<&str>, duration: Option<f64>) -> LibraryItem {
    LibraryItem {
        id: id.to_string(),
        title: title.to_string(),
        artists: vec![artist.to_string()],
        album: album.map(str::to_string),
        duration,
    }
}
