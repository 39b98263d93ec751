//! Destination-library existence check.
//!
//! The library's ingestion often re-encodes titles differently from the playlist
//! catalog ("Song - From Movie" vs "Song (From Movie)"), so the lookup walks a
//! fallback chain:
//!
//! 1. Album search, then the album's children
//! 2. Direct title search with full validation
//! 3. Only if step 2 returned nothing at all: re-query with the dash-to-paren
//!    title, then with brackets also removed, stopping at the first non-empty set
//! 4. Relaxed validation (album ignored) over every raw result seen

use crate::models::{LibraryAlbum, LibraryItem, ReferenceTrack};
use crate::normalize::normalize_title;
use crate::scoring::{
    numbers_close, weighted_word_overlap, LIBRARY_DURATION_TOLERANCE_SECS, LIBRARY_OVERLAP_THRESHOLD,
};
use crate::source::{cap_query, LibrarySource, SourceResult, MAX_QUERY_CHARS};

/// How strictly a library item is compared to the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Validation {
    /// Title, artist, album and duration (each skipped when unknown)
    Full,
    /// Title, known artists and duration; album ignored
    Relaxed,
}

pub struct ExistenceResolver<L> {
    library: L,
    max_query_chars: usize,
}

impl<L: LibrarySource> ExistenceResolver<L> {
    pub fn new(library: L) -> Self {
        Self {
            library,
            max_query_chars: MAX_QUERY_CHARS,
        }
    }

    pub fn with_max_query_chars(mut self, max_query_chars: usize) -> Self {
        self.max_query_chars = max_query_chars;
        self
    }

    pub fn library(&self) -> &L {
        &self.library
    }

    pub fn exists(&self, reference: &ReferenceTrack) -> SourceResult<bool> {
        Ok(self.find(reference)?.is_some())
    }

    /// Library item holding `reference`, if any.
    pub fn find(&self, reference: &ReferenceTrack) -> SourceResult<Option<LibraryItem>> {
        if let Some(item) = self.find_in_album(reference)? {
            tracing::debug!(reference = %reference.id, item = %item.id, "Found via album");
            return Ok(Some(item));
        }

        // STEP 2: direct title search
        let title = reference.title.trim();
        let mut tried = vec![title.to_string()];
        let mut raw = self.search_items(title)?;

        // STEP 3: looser query variants, only when nothing came back at all
        if raw.is_empty() {
            let variants = [
                normalize_title(title, false, true, false),
                normalize_title(title, true, true, false),
            ];
            for variant in variants {
                if variant.is_empty() || tried.contains(&variant) {
                    continue;
                }
                raw = self.search_items(&variant)?;
                tried.push(variant);
                if !raw.is_empty() {
                    break;
                }
            }
        }

        if let Some(item) = raw.iter().find(|item| validate(reference, item, Validation::Full)) {
            tracing::debug!(reference = %reference.id, item = %item.id, queries = tried.len(), "Found via title search");
            return Ok(Some(item.clone()));
        }

        // STEP 4: drop the album requirement
        let relaxed = raw
            .into_iter()
            .find(|item| validate(reference, item, Validation::Relaxed));
        if let Some(item) = &relaxed {
            tracing::debug!(reference = %reference.id, item = %item.id, "Found without album validation");
        }
        Ok(relaxed)
    }

    /// STEP 1: locate the album, then the track among its children.
    fn find_in_album(&self, reference: &ReferenceTrack) -> SourceResult<Option<LibraryItem>> {
        let album = reference.album.trim();
        if album.is_empty() {
            return Ok(None);
        }

        let mut query = normalize_title(album, true, false, false);
        if query.is_empty() {
            query = album.to_string();
        }
        let albums = degrade(
            self.library.search_albums(&cap_query(&query, self.max_query_chars)),
            "search_albums",
        )?;

        for candidate in albums.iter().filter(|a| album_matches(reference, a)) {
            let children = degrade(self.library.album_items(&candidate.id), "album_items")?;
            let hit = children.into_iter().find(|item| {
                title_overlaps(reference, item) && duration_agrees(reference, item)
            });
            if hit.is_some() {
                return Ok(hit);
            }
        }
        Ok(None)
    }

    fn search_items(&self, query: &str) -> SourceResult<Vec<LibraryItem>> {
        degrade(
            self.library.search_items(&cap_query(query, self.max_query_chars)),
            "search_items",
        )
    }
}

/// Turn non-terminal adapter failures into an empty result.
fn degrade<T>(result: SourceResult<Vec<T>>, operation: &str) -> SourceResult<Vec<T>> {
    match result {
        Err(err) if !err.is_terminal() => {
            tracing::debug!(operation, error = %err, "Library query failed, treating as empty");
            Ok(Vec::new())
        }
        other => other,
    }
}

fn album_matches(reference: &ReferenceTrack, album: &LibraryAlbum) -> bool {
    weighted_word_overlap(&reference.album, &album.name) >= LIBRARY_OVERLAP_THRESHOLD
        && (album.artists.is_empty() || artists_overlap(&reference.artists, &album.artists))
}

fn title_overlaps(reference: &ReferenceTrack, item: &LibraryItem) -> bool {
    weighted_word_overlap(&reference.title, &item.title) >= LIBRARY_OVERLAP_THRESHOLD
}

/// True when duration is unknown on either side.
fn duration_agrees(reference: &ReferenceTrack, item: &LibraryItem) -> bool {
    match item.duration {
        Some(duration) if reference.has_duration() && duration > 0.0 => {
            numbers_close(reference.duration, duration, LIBRARY_DURATION_TOLERANCE_SECS)
        }
        _ => true,
    }
}

/// Some reference artist overlaps some library artist.
fn artists_overlap(reference: &[String], library: &[String]) -> bool {
    reference.iter().any(|wanted| {
        library
            .iter()
            .any(|have| weighted_word_overlap(wanted, have) >= LIBRARY_OVERLAP_THRESHOLD)
    })
}

fn validate(reference: &ReferenceTrack, item: &LibraryItem, mode: Validation) -> bool {
    if !duration_agrees(reference, item) {
        return false;
    }

    let artists_known = !reference.artists.is_empty() && !item.artists.is_empty();
    match mode {
        Validation::Full => {
            let artist_ok = !artists_known || artists_overlap(&reference.artists, &item.artists);
            let album_ok = match item.album.as_deref() {
                Some(album) if !reference.album.trim().is_empty() && !album.trim().is_empty() => {
                    weighted_word_overlap(&reference.album, album) >= LIBRARY_OVERLAP_THRESHOLD
                }
                _ => true,
            };
            title_overlaps(reference, item) && artist_ok && album_ok
        }
        Validation::Relaxed => {
            title_overlaps(reference, item) && artists_known && artists_overlap(&reference.artists, &item.artists)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LibraryAlbum;
    use crate::source::{SourceError, SourceResult};
    use crate::testing::{item, MockLibrary};

    fn reference(title: &str) -> ReferenceTrack {
        ReferenceTrack::new(title, &["Hans Zimmer"], "Interstellar", 230.0)
    }

    #[test]
    fn test_found_via_album_children() {
        let mut library = MockLibrary::default();
        library.albums.push(LibraryAlbum {
            id: "alb".to_string(),
            name: "Interstellar".to_string(),
            artists: vec!["Hans Zimmer".to_string()],
        });
        library.children.insert(
            "alb".to_string(),
            vec![
                item("i1", "Cornfield Chase", "Hans Zimmer", Some("Interstellar"), Some(126.0)),
                item("i2", "No Time for Caution", "Hans Zimmer", Some("Interstellar"), Some(231.5)),
            ],
        );
        let resolver = ExistenceResolver::new(library);
        let found = resolver.find(&reference("No Time for Caution")).unwrap().unwrap();
        assert_eq!(found.id, "i2");
        // Album path succeeded, no title search issued
        assert!(resolver.library().item_queries().is_empty());
    }

    #[test]
    fn test_album_with_wrong_artist_is_skipped() {
        let mut library = MockLibrary::default();
        library.albums.push(LibraryAlbum {
            id: "alb".to_string(),
            name: "Interstellar".to_string(),
            artists: vec!["Somebody Else".to_string()],
        });
        library.children.insert(
            "alb".to_string(),
            vec![item("i1", "No Time for Caution", "Somebody Else", None, None)],
        );
        let resolver = ExistenceResolver::new(library);
        assert!(!resolver.exists(&reference("No Time for Caution")).unwrap());
    }

    #[test]
    fn test_direct_search_validates_fields() {
        let mut library = MockLibrary::default();
        library.items_by_query.insert(
            "Stay".to_string(),
            vec![
                item("wrong-duration", "Stay", "Hans Zimmer", Some("Interstellar"), Some(400.0)),
                item("ok", "Stay", "Hans Zimmer", Some("Interstellar"), Some(229.0)),
            ],
        );
        let resolver = ExistenceResolver::new(library);
        assert_eq!(resolver.find(&reference("Stay")).unwrap().unwrap().id, "ok");
    }

    #[test]
    fn test_unknown_fields_are_skipped() {
        let mut library = MockLibrary::default();
        library
            .items_by_query
            .insert("Stay".to_string(), vec![item("bare", "Stay", "Hans Zimmer", None, None)]);
        let resolver = ExistenceResolver::new(library);
        assert!(resolver.exists(&reference("Stay")).unwrap());
    }

    #[test]
    fn test_dash_to_paren_variant_is_tried() {
        let mut library = MockLibrary::default();
        library.items_by_query.insert(
            "Song (From the Motion Picture)".to_string(),
            vec![item("i1", "Song (From the Motion Picture)", "Hans Zimmer", None, None)],
        );
        let resolver = ExistenceResolver::new(library);
        let found = resolver.find(&reference("Song - From the Motion Picture")).unwrap();
        assert_eq!(found.map(|i| i.id), Some("i1".to_string()));
        assert_eq!(
            resolver.library().item_queries(),
            vec!["Song - From the Motion Picture", "Song (From the Motion Picture)"]
        );
    }

    #[test]
    fn test_bracket_removal_variant_and_album_relaxation() {
        let mut library = MockLibrary::default();
        library.items_by_query.insert(
            "Song".to_string(),
            vec![item("i1", "Song (Live)", "Hans Zimmer", Some("Other Album"), None)],
        );
        let resolver = ExistenceResolver::new(library);
        // Album disagrees, so only the relaxed pass accepts it
        let found = resolver.find(&reference("Song (Live)")).unwrap();
        assert_eq!(found.map(|i| i.id), Some("i1".to_string()));
        assert_eq!(resolver.library().item_queries(), vec!["Song (Live)", "Song"]);
    }

    #[test]
    fn test_relaxed_pass_still_requires_title() {
        let mut library = MockLibrary::default();
        library.items_by_query.insert(
            "Love".to_string(),
            vec![item("other-song", "Love Me Tender Medley", "Hans Zimmer", None, None)],
        );
        let resolver = ExistenceResolver::new(library);
        assert_eq!(resolver.find(&reference("Love")).unwrap(), None);
    }

    #[test]
    fn test_relaxed_pass_still_requires_artist() {
        let mut library = MockLibrary::default();
        library.items_by_query.insert(
            "Stay".to_string(),
            vec![item("cover", "Stay", "Someone Else", Some("Other Album"), None)],
        );
        let resolver = ExistenceResolver::new(library);
        assert!(!resolver.exists(&reference("Stay")).unwrap());
    }

    #[test]
    fn test_variants_not_tried_when_raw_results_exist() {
        let mut library = MockLibrary::default();
        library.items_by_query.insert(
            "Song - From the Motion Picture".to_string(),
            vec![item("other", "Song - From the Motion Picture", "Different Artist", None, None)],
        );
        let resolver = ExistenceResolver::new(library);
        assert!(!resolver.exists(&reference("Song - From the Motion Picture")).unwrap());
        assert_eq!(resolver.library().item_queries().len(), 1);
    }

    #[test]
    fn test_library_errors_degrade_to_not_found() {
        let library = MockLibrary {
            fail_items: true,
            ..Default::default()
        };
        let resolver = ExistenceResolver::new(library);
        assert!(!resolver.exists(&reference("Stay")).unwrap());
    }

    struct RateLimitedLibrary;

    impl LibrarySource for RateLimitedLibrary {
        fn search_albums(&self, _query: &str) -> SourceResult<Vec<LibraryAlbum>> {
            Err(SourceError::RateLimitExceeded { attempts: 8 })
        }

        fn album_items(&self, _album_id: &str) -> SourceResult<Vec<LibraryItem>> {
            Ok(Vec::new())
        }

        fn search_items(&self, _query: &str) -> SourceResult<Vec<LibraryItem>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_rate_limit_exhaustion_propagates() {
        let resolver = ExistenceResolver::new(RateLimitedLibrary);
        assert!(matches!(
            resolver.exists(&reference("Stay")),
            Err(SourceError::RateLimitExceeded { attempts: 8 })
        ));
    }
}
