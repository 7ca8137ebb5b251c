//! Change processor: turns a batch of filesystem events into a catalogue
//! delta, and applies that delta to a `LibraryStructure` by re-running the
//! album builder over the resulting song set.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use rayon::prelude::*;

use crate::models::{FileChange, LibraryStructure, LibraryUpdate, SongMetadata};
use crate::utils::hashing::song_id;

use super::albums::build_albums;
use super::extractor::extract;

/// Batch a list of `FileChange`s against the current library into one
/// `LibraryUpdate`. A rename is treated as a removal of the old path plus an
/// addition of the new one. Extraction failures for added/modified files are
/// logged and simply omitted from the delta rather than failing the batch.
pub fn process_changes(changes: &[FileChange], library: &LibraryStructure) -> LibraryUpdate {
    // path -> album_id, recomputed once so per-change lookups are O(1).
    let reverse_index: HashMap<&str, &str> = library
        .albums
        .values()
        .flat_map(|album| album.songs.iter().map(move |s| (s.path.as_str(), album.id.as_str())))
        .collect();

    let mut to_add_paths = Vec::new();
    let mut removed_ids = HashSet::new();
    let mut affected_album_ids = HashSet::new();
    let mut latest_at = None;

    for change in changes {
        latest_at = Some(latest_at.map_or(change.timestamp(), |prev| prev.max(change.timestamp())));

        match change {
            FileChange::Added { path, .. } => to_add_paths.push(path.clone()),
            FileChange::Modified { path, .. } => {
                if let Some(song) = library.find_song_by_path(path) {
                    removed_ids.insert(song.id.clone());
                }
                to_add_paths.push(path.clone());
            }
            FileChange::Removed { path, .. } => {
                removed_ids.insert(song_id(path));
                if let Some(album_id) = reverse_index.get(path.as_str()) {
                    affected_album_ids.insert(album_id.to_string());
                }
            }
            FileChange::Renamed { old_path, path, .. } => {
                removed_ids.insert(song_id(old_path));
                if let Some(album_id) = reverse_index.get(old_path.as_str()) {
                    affected_album_ids.insert(album_id.to_string());
                }
                to_add_paths.push(path.clone());
            }
        }
    }

    let extracted: Vec<SongMetadata> = to_add_paths
        .par_iter()
        .filter_map(|path| match extract(Path::new(path), false) {
            Ok(song) => Some(song),
            Err(e) => {
                tracing::warn!("soft-failing change-processor extraction for {}: {}", path, e);
                None
            }
        })
        .collect();

    let added: Vec<SongMetadata> = extracted.iter().filter(|s| !removed_ids.contains(&s.id)).cloned().collect();
    let modified: Vec<SongMetadata> = extracted.into_iter().filter(|s| removed_ids.contains(&s.id)).collect();

    for album_id in library.albums.keys() {
        let touches = library.albums[album_id]
            .songs
            .iter()
            .any(|s| removed_ids.contains(&s.id));
        if touches {
            affected_album_ids.insert(album_id.clone());
        }
    }

    LibraryUpdate {
        added,
        removed_ids,
        modified,
        affected_album_ids,
        at: latest_at,
    }
}

/// Apply `update` to `library`, producing a new `LibraryStructure`. Removed
/// IDs drop their songs, modified songs replace their prior record, and
/// added songs join the pool before the album builder re-groups everything.
pub fn apply_update(update: &LibraryUpdate, library: &LibraryStructure) -> LibraryStructure {
    let modified_ids: HashSet<&str> = update.modified.iter().map(|s| s.id.as_str()).collect();

    let mut pool: Vec<SongMetadata> = library
        .all_songs()
        .into_iter()
        .filter(|s| !update.removed_ids.contains(&s.id) && !modified_ids.contains(s.id.as_str()))
        .cloned()
        .collect();

    pool.extend(update.modified.iter().cloned());
    pool.extend(update.added.iter().cloned());

    let build_result = build_albums(pool);
    let mut albums = HashMap::new();
    for album in build_result.albums {
        albums.insert(album.id.clone(), album);
    }

    LibraryStructure {
        albums,
        standalone_songs: build_result.standalone,
        folder_playlists: library.folder_playlists.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn song(path: &str, title: &str, album: Option<&str>) -> SongMetadata {
        let mut s = SongMetadata::new(path.to_string(), 1, 0);
        s.title = Some(title.to_string());
        s.artist = Some("A".to_string());
        s.album = album.map(|a| a.to_string());
        s
    }

    #[test]
    fn removal_marks_song_for_deletion() {
        let mut library = LibraryStructure::default();
        let s = song("/a.mp3", "T", None);
        let sid = s.id.clone();
        library.standalone_songs.push(s);

        let changes = vec![FileChange::Removed {
            path: "/a.mp3".to_string(),
            at: Utc::now(),
        }];
        let update = process_changes(&changes, &library);
        assert!(update.removed_ids.contains(&sid));
    }

    #[test]
    fn apply_update_removes_song_from_library() {
        let mut library = LibraryStructure::default();
        let s = song("/a.mp3", "T", None);
        let sid = s.id.clone();
        library.standalone_songs.push(s);

        let mut update = LibraryUpdate::default();
        update.removed_ids.insert(sid);

        let result = apply_update(&update, &library);
        assert!(result.standalone_songs.is_empty());
    }

    #[test]
    fn rename_is_removal_plus_addition() {
        let library = LibraryStructure::default();
        let changes = vec![FileChange::Renamed {
            old_path: "/old.mp3".to_string(),
            path: "/new.mp3".to_string(),
            at: Utc::now(),
        }];
        let update = process_changes(&changes, &library);
        assert!(update.removed_ids.contains(&song_id("/old.mp3")));
    }
}
