//! Library manager: the single in-process owner of the catalogue, its LRU
//! artwork/duration caches, and the lazy-extraction paths the HTTP layer
//! calls into on a cache miss.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};

use crate::error::{CoreError, CoreResult};
use crate::models::{FileChange, LibraryStructure};

use super::cache::MetadataCache;
use super::change_processor::{apply_update, process_changes};
use super::extractor::extract;
use super::orchestrator::run_scan;

const ARTWORK_CACHE_SIZE: usize = 50;
const SONG_ARTWORK_CACHE_SIZE: usize = 100;
const DURATION_CACHE_SIZE: usize = 2000;

/// Events listeners can subscribe to. Kept deliberately small: listener
/// callbacks must never block, so payloads are cheap to copy.
#[derive(Debug, Clone)]
pub enum LibraryEvent {
    ScanComplete,
    DurationWarmupComplete { updated: usize },
}

pub type ListenerHandle = u64;
type Listener = Box<dyn Fn(&LibraryEvent) + Send + Sync>;

struct LibraryState {
    library: Option<LibraryStructure>,
    metadata_cache: MetadataCache,
    artwork_cache: LruCache<String, Option<Vec<u8>>>,
    song_artwork_cache: LruCache<String, Option<Vec<u8>>>,
    duration_cache: LruCache<String, Option<u32>>,
}

pub struct LibraryManager {
    state: RwLock<LibraryState>,
    is_scanning: Mutex<bool>,
    warmup_running: AtomicBool,
    warmup_cancel: AtomicBool,
    listeners: Mutex<HashMap<ListenerHandle, Listener>>,
    next_handle: AtomicU64,
}

impl LibraryManager {
    pub fn new(cache_path: PathBuf) -> Arc<Self> {
        let metadata_cache = MetadataCache::load(cache_path);
        Arc::new(Self {
            state: RwLock::new(LibraryState {
                library: None,
                metadata_cache,
                artwork_cache: LruCache::new(NonZeroUsize::new(ARTWORK_CACHE_SIZE).unwrap()),
                song_artwork_cache: LruCache::new(NonZeroUsize::new(SONG_ARTWORK_CACHE_SIZE).unwrap()),
                duration_cache: LruCache::new(NonZeroUsize::new(DURATION_CACHE_SIZE).unwrap()),
            }),
            is_scanning: Mutex::new(false),
            warmup_running: AtomicBool::new(false),
            warmup_cancel: AtomicBool::new(false),
            listeners: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        })
    }

    /// Kick off a scan of `root` on a blocking worker. Concurrent calls while
    /// one is already running are a no-op: the current snapshot is left
    /// untouched and `ScanBusy` is returned immediately.
    pub fn scan(self: &Arc<Self>, root: PathBuf) -> CoreResult<()> {
        {
            let mut scanning = self.is_scanning.lock();
            if *scanning {
                return Err(CoreError::ScanBusy);
            }
            *scanning = true;
        }

        let this = Arc::clone(self);
        crate::utils::threading::spawn_blocking(move || {
            // Work on a private copy of the metadata cache so readers of the
            // live library aren't blocked for the whole scan; only the final
            // swap below takes the write lock, matching the teacher's
            // compute-then-swap store update pattern.
            let mut scratch_cache = this.state.read().metadata_cache.clone();

            let outcome = run_scan(&root, &mut scratch_cache, |progress| {
                tracing::debug!(
                    stage = ?progress.stage,
                    pct = progress.percentage,
                    "{}",
                    progress.message
                );
            });

            match outcome {
                Ok(outcome) => {
                    let mut guard = this.state.write();
                    guard.library = Some(outcome.library);
                    guard.metadata_cache.merge(scratch_cache.entries().clone());
                    if let Err(e) = guard.metadata_cache.save() {
                        tracing::warn!("failed to save metadata cache after scan: {}", e);
                    }
                    drop(guard);
                    *this.is_scanning.lock() = false;
                    this.notify(&LibraryEvent::ScanComplete);
                    this.start_duration_warmup(false);
                }
                Err(e) => {
                    tracing::warn!("scan failed: {}", e);
                    *this.is_scanning.lock() = false;
                }
            }
        });

        Ok(())
    }

    /// Fold a batch of filesystem changes (from the watchdog) into the
    /// current library without a full rescan. A no-op before the first scan
    /// has populated a library to apply changes against.
    pub fn apply_changes(&self, changes: &[FileChange]) {
        let Some(current) = self.state.read().library.clone() else {
            return;
        };

        // Extraction and album rebuilding happen off the write lock so
        // readers aren't blocked for the duration of the (parallel) file I/O.
        let update = process_changes(changes, &current);
        let updated = apply_update(&update, &current);

        let mut guard = self.state.write();
        guard.library = Some(updated);
        drop(guard);

        tracing::info!(
            added = update.added.len(),
            removed = update.removed_ids.len(),
            modified = update.modified.len(),
            "applied watchdog change batch"
        );
        self.notify(&LibraryEvent::ScanComplete);
    }

    pub fn current_library(&self) -> Option<LibraryStructure> {
        self.state.read().library.clone()
    }

    pub fn get_song_path(&self, song_id: &str) -> Option<String> {
        self.state
            .read()
            .library
            .as_ref()
            .and_then(|lib| lib.find_song(song_id))
            .map(|s| s.path.clone())
    }

    pub fn find_song_by_path(&self, path: &str) -> Option<crate::models::SongMetadata> {
        self.state
            .read()
            .library
            .as_ref()
            .and_then(|lib| lib.find_song_by_path(path))
            .cloned()
    }

    /// Album artwork, by whichever song in the album yields a picture first.
    /// Misses (including "no artwork anywhere in this album") are cached so
    /// a broken/untagged album isn't re-probed on every request.
    pub fn get_album_artwork(&self, album_id: &str) -> Option<Vec<u8>> {
        if let Some(cached) = self.state.write().artwork_cache.get(album_id).cloned() {
            return cached;
        }

        let candidate_paths: Vec<String> = {
            let guard = self.state.read();
            match guard.library.as_ref().and_then(|lib| lib.albums.get(album_id)) {
                Some(album) => album.songs.iter().map(|s| s.path.clone()).collect(),
                None => Vec::new(),
            }
        };

        let artwork = candidate_paths
            .iter()
            .find_map(|path| extract(Path::new(path), false).ok().and_then(|s| s.artwork));

        self.state.write().artwork_cache.put(album_id.to_string(), artwork.clone());
        artwork
    }

    pub fn get_song_artwork(&self, song_id: &str) -> Option<Vec<u8>> {
        if let Some(cached) = self.state.write().song_artwork_cache.get(song_id).cloned() {
            return cached;
        }

        let path = self.get_song_path(song_id);
        let artwork = path.and_then(|p| extract(Path::new(&p), false).ok().and_then(|s| s.artwork));

        self.state
            .write()
            .song_artwork_cache
            .put(song_id.to_string(), artwork.clone());
        artwork
    }

    /// Duration lookup with lazy extraction on a cache miss. The extracted
    /// value is folded back into both the in-memory song and the persistent
    /// metadata cache so a later process restart sees it without re-extracting.
    pub fn get_song_duration(&self, song_id: &str) -> Option<u32> {
        if let Some(cached) = self.state.write().duration_cache.get(song_id).cloned() {
            return cached;
        }

        let path = self.get_song_path(song_id);
        let duration = path
            .as_ref()
            .and_then(|p| extract(Path::new(p), false).ok())
            .and_then(|s| s.duration);

        let mut guard = self.state.write();
        guard.duration_cache.put(song_id.to_string(), duration);
        if let (Some(d), Some(path)) = (duration, &path) {
            if let Some(lib) = &mut guard.library {
                if let Some(song) = lib.find_song_mut(song_id) {
                    song.duration = Some(d);
                }
            }
            guard.metadata_cache.update_duration(path, d);
        }
        duration
    }

    /// Synchronous snapshot using only already-known durations.
    pub fn to_api_json(&self, base_url: &str) -> Value {
        self.build_snapshot(base_url, false)
    }

    /// Snapshot that performs lazy duration extraction for every song
    /// missing one before building the response.
    pub fn to_api_json_with_durations(&self, base_url: &str) -> Value {
        self.build_snapshot(base_url, true)
    }

    fn build_snapshot(&self, base_url: &str, extract_missing: bool) -> Value {
        let library = match self.current_library() {
            Some(lib) => lib,
            None => {
                return json!({
                    "albums": [],
                    "songs": [],
                    "playlists": [],
                    "durationsReady": true,
                    "lastUpdated": Utc::now().to_rfc3339(),
                });
            }
        };

        let mut durations_ready = true;
        let mut song_jsons = Vec::new();

        for song in library.all_songs() {
            let duration = match song.duration {
                Some(d) if d > 0 => Some(d),
                _ if extract_missing => self.get_song_duration(&song.id),
                _ => None,
            };
            if duration.is_none() {
                durations_ready = false;
            }
            let album_id = library.album_id_for_song(&song.id);
            song_jsons.push(song_json(song, album_id, duration));
        }

        let album_jsons: Vec<Value> = library
            .albums
            .values()
            .filter(|a| a.is_valid())
            .map(|a| album_summary_json(a, base_url))
            .collect();

        let playlist_jsons: Vec<Value> = library
            .folder_playlists
            .iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "name": p.name,
                    "songIds": p.song_ids,
                })
            })
            .collect();

        json!({
            "albums": album_jsons,
            "songs": song_jsons,
            "playlists": playlist_jsons,
            "durationsReady": durations_ready,
            "lastUpdated": Utc::now().to_rfc3339(),
        })
    }

    /// Album detail view: the album plus its songs, each with a resolved
    /// duration (lazily extracted on miss).
    pub fn get_album_detail(&self, album_id: &str, base_url: &str) -> Option<Value> {
        let library = self.current_library()?;
        let album = library.albums.get(album_id)?;

        let songs: Vec<Value> = album
            .songs
            .iter()
            .map(|s| {
                let duration = match s.duration {
                    Some(d) if d > 0 => Some(d),
                    _ => self.get_song_duration(&s.id),
                };
                song_json(s, Some(album_id.to_string()), duration)
            })
            .collect();

        Some(json!({
            "id": album.id,
            "title": album.title,
            "artist": album.artist,
            "year": album.year,
            "coverArt": format!("{base_url}/artwork/{}", album.id),
            "songs": songs,
        }))
    }

    /// Start (or restart, if `force`) the duration warm-up. With `force`
    /// false, only songs with a missing/zero duration are (re)extracted.
    pub fn start_duration_warmup(self: &Arc<Self>, force: bool) {
        if self.warmup_running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.warmup_cancel.store(false, Ordering::SeqCst);

        let this = Arc::clone(self);
        crate::utils::threading::spawn_blocking(move || {
            this.run_duration_warmup(force);
        });
    }

    fn run_duration_warmup(self: Arc<Self>, force: bool) {
        tracing::info!("duration warm-up starting");

        let candidates: Vec<String> = {
            let guard = self.state.read();
            match &guard.library {
                None => Vec::new(),
                Some(lib) => lib
                    .all_songs()
                    .into_iter()
                    .filter(|s| force || !matches!(s.duration, Some(d) if d > 0))
                    .map(|s| s.id.clone())
                    .collect(),
            }
        };

        let mut updated = 0usize;
        for song_id in candidates {
            if self.warmup_cancel.load(Ordering::Relaxed) {
                tracing::info!("duration warm-up cancelled after {} songs", updated);
                break;
            }
            if self.get_song_duration(&song_id).is_some() {
                updated += 1;
            }
        }

        if let Err(e) = self.state.read().metadata_cache.save() {
            tracing::warn!("failed to persist metadata cache after warm-up: {}", e);
        }

        tracing::info!("duration warm-up complete: {} songs updated", updated);
        self.warmup_running.store(false, Ordering::SeqCst);
        self.notify(&LibraryEvent::DurationWarmupComplete { updated });
    }

    pub fn cancel_warmup(&self) {
        self.warmup_cancel.store(true, Ordering::SeqCst);
    }

    pub fn register_listener(&self, listener: Listener) -> ListenerHandle {
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().insert(handle, listener);
        handle
    }

    pub fn unregister_listener(&self, handle: ListenerHandle) {
        self.listeners.lock().remove(&handle);
    }

    fn notify(&self, event: &LibraryEvent) {
        for listener in self.listeners.lock().values() {
            listener(event);
        }
    }

    pub fn clear(&self) {
        let mut guard = self.state.write();
        guard.library = None;
        guard.metadata_cache.clear();
        guard.artwork_cache.clear();
        guard.song_artwork_cache.clear();
        guard.duration_cache.clear();
    }
}

fn song_json(song: &crate::models::SongMetadata, album_id: Option<String>, duration: Option<u32>) -> Value {
    json!({
        "id": song.id,
        "title": song.display_title(),
        "artist": song.artist,
        "albumId": album_id,
        "duration": duration,
        "trackNumber": song.track_no,
    })
}

fn album_summary_json(album: &crate::models::Album, base_url: &str) -> Value {
    json!({
        "id": album.id,
        "title": album.title,
        "artist": album.artist,
        "coverArt": format!("{base_url}/artwork/{}", album.id),
        "songCount": album.songs.len(),
        "duration": album.duration_secs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_library_snapshot_has_durations_ready_true() {
        let dir = TempDir::new().unwrap();
        let manager = LibraryManager::new(dir.path().join("cache.json"));
        let snapshot = manager.to_api_json("http://localhost");
        assert_eq!(snapshot["durationsReady"], true);
        assert!(snapshot["albums"].as_array().unwrap().is_empty());
    }

    #[test]
    fn concurrent_scan_rejected_while_scanning() {
        let dir = TempDir::new().unwrap();
        let manager = LibraryManager::new(dir.path().join("cache.json"));
        *manager.is_scanning.lock() = true;
        let result = manager.scan(dir.path().to_path_buf());
        assert!(matches!(result, Err(CoreError::ScanBusy)));
    }

    #[test]
    fn listener_registration_and_unregistration_round_trip() {
        let dir = TempDir::new().unwrap();
        let manager = LibraryManager::new(dir.path().join("cache.json"));
        let handle = manager.register_listener(Box::new(|_event| {}));
        manager.unregister_listener(handle);
        assert!(manager.listeners.lock().is_empty());
    }

    #[test]
    fn artwork_miss_is_cached_as_none() {
        let dir = TempDir::new().unwrap();
        let manager = LibraryManager::new(dir.path().join("cache.json"));
        let first = manager.get_album_artwork("nonexistent");
        assert!(first.is_none());
        assert!(manager.state.write().artwork_cache.contains("nonexistent"));
    }
}
