//! Bounded LRU memoization around candidate and library adapters.
//!
//! Caches are shared by every resolution running in the process, so each one
//! sits behind a `Mutex`. Only successful results are stored; a failed query is
//! retried from scratch on the next call.

use std::hash::Hash;
use std::sync::Mutex;

use rustc_hash::FxHashMap;

use crate::models::{AlbumRef, CandidateRecord, LibraryAlbum, LibraryItem};
use crate::source::{CandidateSource, LibrarySource, SourceResult};

// ============================================================================
// LRU Cache
// ============================================================================

struct LruInner<K, V> {
    entries: FxHashMap<K, (V, u64)>,
    tick: u64,
}

/// Thread-safe least-recently-used cache with a fixed capacity.
pub struct LruCache<K, V> {
    capacity: usize,
    inner: Mutex<LruInner<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(LruInner {
                entries: FxHashMap::default(),
                tick: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up `key`, marking it as most recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;
        inner.entries.get_mut(key).map(|(value, used)| {
            *used = tick;
            value.clone()
        })
    }

    /// Insert `value`, evicting the least recently used entry when full.
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.lock();
        inner.tick += 1;
        let tick = inner.tick;

        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, (_, used))| *used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
            }
        }
        inner.entries.insert(key, (value, tick));
    }

    /// Return the cached value or compute, store and return it.
    ///
    /// The lock is not held while `compute` runs, so two threads missing on the
    /// same key may both compute; the later insert wins.
    pub fn get_or_try_insert<E>(
        &self,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruInner<K, V>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ============================================================================
// Memoizing Adapter
// ============================================================================

/// Adapter decorator memoizing every operation by its full argument tuple.
///
/// Wraps either seam; the caches for the other one simply stay empty.
pub struct Cached<S> {
    inner: S,
    by_isrc: LruCache<String, Vec<CandidateRecord>>,
    by_barcode: LruCache<String, Vec<AlbumRef>>,
    by_album: LruCache<AlbumRef, Vec<CandidateRecord>>,
    by_text: LruCache<(String, String), Vec<CandidateRecord>>,
    library_albums: LruCache<String, Vec<LibraryAlbum>>,
    library_children: LruCache<String, Vec<LibraryItem>>,
    library_items: LruCache<String, Vec<LibraryItem>>,
}

impl<S> Cached<S> {
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            by_isrc: LruCache::new(capacity),
            by_barcode: LruCache::new(capacity),
            by_album: LruCache::new(capacity),
            by_text: LruCache::new(capacity),
            library_albums: LruCache::new(capacity),
            library_children: LruCache::new(capacity),
            library_items: LruCache::new(capacity),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: CandidateSource> CandidateSource for Cached<S> {
    fn search_by_isrc(&self, isrc: &str) -> SourceResult<Vec<CandidateRecord>> {
        self.by_isrc
            .get_or_try_insert(isrc.to_string(), || self.inner.search_by_isrc(isrc))
    }

    fn search_albums_by_barcode(&self, barcode: &str) -> SourceResult<Vec<AlbumRef>> {
        self.by_barcode.get_or_try_insert(barcode.to_string(), || {
            self.inner.search_albums_by_barcode(barcode)
        })
    }

    fn album_tracks(&self, album: &AlbumRef) -> SourceResult<Vec<CandidateRecord>> {
        self.by_album
            .get_or_try_insert(album.clone(), || self.inner.album_tracks(album))
    }

    fn search_by_text(&self, title: &str, artist: &str) -> SourceResult<Vec<CandidateRecord>> {
        self.by_text
            .get_or_try_insert((title.to_string(), artist.to_string()), || {
                self.inner.search_by_text(title, artist)
            })
    }
}

impl<S: LibrarySource> LibrarySource for Cached<S> {
    fn search_albums(&self, query: &str) -> SourceResult<Vec<LibraryAlbum>> {
        self.library_albums
            .get_or_try_insert(query.to_string(), || self.inner.search_albums(query))
    }

    fn album_items(&self, album_id: &str) -> SourceResult<Vec<LibraryItem>> {
        self.library_children
            .get_or_try_insert(album_id.to_string(), || self.inner.album_items(album_id))
    }

    fn search_items(&self, query: &str) -> SourceResult<Vec<LibraryItem>> {
        self.library_items
            .get_or_try_insert(query.to_string(), || self.inner.search_items(query))
    }
}
