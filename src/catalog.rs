//! SQLite-backed catalog snapshot.
//!
//! A local copy of a remote catalog, imported from a JSON snapshot and indexed
//! with FTS5. It serves both adapter seams, so the same file can stand in for the
//! download source (`CandidateSource`) or the destination library (`LibrarySource`).

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::models::{AlbumRef, CandidateRecord, LibraryAlbum, LibraryItem};
use crate::normalize::tokenize;
use crate::source::{CandidateSource, LibrarySource, SourceResult};

/// Maximum rows returned by one free-text search.
pub const SEARCH_LIMIT: usize = 25;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS albums (
        pk INTEGER PRIMARY KEY,
        id TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        artists TEXT NOT NULL,
        artists_json TEXT NOT NULL,
        barcode TEXT,
        year INTEGER
    );

    CREATE TABLE IF NOT EXISTS tracks (
        pk INTEGER PRIMARY KEY,
        id TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        artists TEXT NOT NULL,
        artists_json TEXT NOT NULL,
        album_id TEXT,
        album TEXT NOT NULL,
        duration_sec REAL NOT NULL,
        isrc TEXT,
        quality TEXT NOT NULL,
        track_number INTEGER
    );

    CREATE INDEX IF NOT EXISTS idx_albums_barcode ON albums(barcode);
    CREATE INDEX IF NOT EXISTS idx_tracks_isrc ON tracks(isrc COLLATE NOCASE);
    CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks(album_id, track_number);

    CREATE VIRTUAL TABLE IF NOT EXISTS tracks_fts USING fts5(
        title, artists, album,
        content='tracks',
        content_rowid='pk',
        tokenize='porter unicode61 remove_diacritics 2'
    );

    CREATE VIRTUAL TABLE IF NOT EXISTS albums_fts USING fts5(
        title, artists,
        content='albums',
        content_rowid='pk',
        tokenize='porter unicode61 remove_diacritics 2'
    );";

const TRACK_COLUMNS: &str = "t.id, t.title, t.artists_json, t.album, t.duration_sec, t.isrc, t.quality";

// ============================================================================
// Snapshot Format
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotAlbum {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotTrack {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artists: Vec<String>,
    #[serde(default)]
    pub album_id: Option<String>,
    /// Album title; falls back to the title of `album_id` when absent.
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub isrc: Option<String>,
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub track_number: Option<u32>,
}

/// JSON export of a catalog: albums plus tracks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(default)]
    pub albums: Vec<SnapshotAlbum>,
    #[serde(default)]
    pub tracks: Vec<SnapshotTrack>,
}

impl CatalogSnapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot {:?}", path))?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse snapshot {:?}", path))
    }
}

// ============================================================================
// SQLite Catalog
// ============================================================================

pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open (or create) a catalog file and make sure the schema exists.
    pub fn open(path: &Path) -> SourceResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;",
        )?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> SourceResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> SourceResult<Self> {
        let catalog = Self {
            conn: Mutex::new(conn),
        };
        catalog.create_schema()?;
        Ok(catalog)
    }

    pub fn create_schema(&self) -> SourceResult<()> {
        self.lock().execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert every album and track of `snapshot` in one transaction.
    ///
    /// Rows with an id already present are replaced. The FTS index is not
    /// touched; call `rebuild_index` afterwards.
    pub fn import_snapshot(&self, snapshot: &CatalogSnapshot) -> SourceResult<usize> {
        let album_titles: FxHashMap<&str, &str> = snapshot
            .albums
            .iter()
            .map(|a| (a.id.as_str(), a.title.as_str()))
            .collect();

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        {
            let mut insert_album = tx.prepare_cached(
                "INSERT OR REPLACE INTO albums (id, title, artists, artists_json, barcode, year)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for album in &snapshot.albums {
                insert_album.execute(params![
                    album.id,
                    album.title,
                    album.artists.join(", "),
                    serde_json::to_string(&album.artists)?,
                    album.barcode.as_deref().map(str::trim).filter(|b| !b.is_empty()),
                    album.year,
                ])?;
            }

            let mut insert_track = tx.prepare_cached(
                "INSERT OR REPLACE INTO tracks
                    (id, title, artists, artists_json, album_id, album, duration_sec, isrc, quality, track_number)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for track in &snapshot.tracks {
                let album = track
                    .album
                    .as_deref()
                    .or_else(|| track.album_id.as_deref().and_then(|id| album_titles.get(id).copied()))
                    .unwrap_or("");
                insert_track.execute(params![
                    track.id,
                    track.title,
                    track.artists.join(", "),
                    serde_json::to_string(&track.artists)?,
                    track.album_id,
                    album,
                    track.duration,
                    track.isrc.as_deref().map(str::trim).filter(|i| !i.is_empty()),
                    track.quality,
                    track.track_number,
                ])?;
            }
        }
        tx.commit()?;

        Ok(snapshot.tracks.len())
    }

    /// Rebuild both FTS indexes from their content tables.
    pub fn rebuild_index(&self) -> SourceResult<()> {
        let conn = self.lock();
        conn.execute("INSERT INTO tracks_fts(tracks_fts) VALUES('rebuild')", [])?;
        conn.execute("INSERT INTO albums_fts(albums_fts) VALUES('rebuild')", [])?;
        Ok(())
    }

    pub fn optimize(&self) -> SourceResult<()> {
        self.lock().execute_batch("VACUUM; ANALYZE;")?;
        Ok(())
    }

    pub fn track_count(&self) -> SourceResult<usize> {
        let count: i64 = self.lock().query_row("SELECT COUNT(*) FROM tracks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn album_count(&self) -> SourceResult<usize> {
        let count: i64 = self.lock().query_row("SELECT COUNT(*) FROM albums", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Title of the album stored under `album_id`.
    pub fn album_title(&self, album_id: &str) -> SourceResult<Option<String>> {
        let title = self
            .lock()
            .query_row("SELECT title FROM albums WHERE id = ?1", [album_id], |row| row.get(0))
            .optional()?;
        Ok(title)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn query_tracks<P: Params>(&self, sql: &str, params: P) -> SourceResult<Vec<CandidateRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let mut rows = stmt.query(params)?;

        let mut tracks = Vec::new();
        while let Some(row) = rows.next()? {
            tracks.push(read_candidate(row)?);
        }
        Ok(tracks)
    }

    fn search_tracks_fts(&self, terms: &[String]) -> SourceResult<Vec<CandidateRecord>> {
        let Some(query) = fts_query(terms) else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT {}
             FROM tracks_fts fts
             JOIN tracks t ON fts.rowid = t.pk
             WHERE tracks_fts MATCH ?1
             ORDER BY fts.rank
             LIMIT ?2",
            TRACK_COLUMNS
        );
        self.query_tracks(&sql, params![query, SEARCH_LIMIT as i64])
    }
}

fn read_candidate(row: &Row<'_>) -> SourceResult<CandidateRecord> {
    let artists_json: String = row.get(2)?;
    Ok(CandidateRecord {
        id: row.get(0)?,
        title: row.get(1)?,
        artists: serde_json::from_str(&artists_json)?,
        album: row.get(3)?,
        duration: row.get(4)?,
        isrc: row.get(5)?,
        quality: row.get(6)?,
    })
}

/// Quoted FTS5 terms joined by implicit AND, or `None` when there is nothing to search.
pub fn fts_query(terms: &[String]) -> Option<String> {
    if terms.is_empty() {
        return None;
    }
    Some(
        terms
            .iter()
            .map(|t| format!("\"{}\"", t.replace('"', "")))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

impl From<CandidateRecord> for LibraryItem {
    fn from(record: CandidateRecord) -> Self {
        LibraryItem {
            id: record.id,
            title: record.title,
            artists: record.artists,
            album: Some(record.album).filter(|a| !a.trim().is_empty()),
            duration: Some(record.duration).filter(|d| *d > 0.0),
        }
    }
}

impl CandidateSource for SqliteCatalog {
    fn search_by_isrc(&self, isrc: &str) -> SourceResult<Vec<CandidateRecord>> {
        let sql = format!(
            "SELECT {} FROM tracks t WHERE t.isrc = ?1 COLLATE NOCASE ORDER BY t.pk",
            TRACK_COLUMNS
        );
        self.query_tracks(&sql, [isrc.trim()])
    }

    fn search_albums_by_barcode(&self, barcode: &str) -> SourceResult<Vec<AlbumRef>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached("SELECT id, title FROM albums WHERE barcode = ?1 ORDER BY pk")?;
        let albums = stmt
            .query_map([barcode.trim()], |row| {
                Ok(AlbumRef {
                    id: row.get(0)?,
                    title: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(albums)
    }

    fn album_tracks(&self, album: &AlbumRef) -> SourceResult<Vec<CandidateRecord>> {
        let sql = format!(
            "SELECT {} FROM tracks t WHERE t.album_id = ?1 ORDER BY t.track_number, t.pk",
            TRACK_COLUMNS
        );
        self.query_tracks(&sql, [album.id.as_str()])
    }

    fn search_by_text(&self, title: &str, artist: &str) -> SourceResult<Vec<CandidateRecord>> {
        let mut terms = tokenize(title);
        terms.extend(tokenize(artist));
        self.search_tracks_fts(&terms)
    }
}

impl LibrarySource for SqliteCatalog {
    fn search_albums(&self, query: &str) -> SourceResult<Vec<LibraryAlbum>> {
        let Some(fts) = fts_query(&tokenize(query)) else {
            return Ok(Vec::new());
        };

        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT a.id, a.title, a.artists_json
             FROM albums_fts fts
             JOIN albums a ON fts.rowid = a.pk
             WHERE albums_fts MATCH ?1
             ORDER BY fts.rank
             LIMIT ?2",
        )?;
        let mut rows = stmt.query(params![fts, SEARCH_LIMIT as i64])?;

        let mut albums = Vec::new();
        while let Some(row) = rows.next()? {
            let artists_json: String = row.get(2)?;
            albums.push(LibraryAlbum {
                id: row.get(0)?,
                name: row.get(1)?,
                artists: serde_json::from_str(&artists_json)?,
            });
        }
        Ok(albums)
    }

    fn album_items(&self, album_id: &str) -> SourceResult<Vec<LibraryItem>> {
        let album = AlbumRef {
            id: album_id.to_string(),
            title: String::new(),
        };
        Ok(self.album_tracks(&album)?.into_iter().map(LibraryItem::from).collect())
    }

    fn search_items(&self, query: &str) -> SourceResult<Vec<LibraryItem>> {
        Ok(self
            .search_tracks_fts(&tokenize(query))?
            .into_iter()
            .map(LibraryItem::from)
            .collect())
    }
}
