//! The catalogue itself (`LibraryStructure`) and its change types.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::album::Album;
use super::playlist::FolderPlaylist;
use super::song::SongMetadata;

/// The full, current catalogue snapshot owned by the Library Manager.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryStructure {
    pub albums: HashMap<String, Album>,
    pub standalone_songs: Vec<SongMetadata>,
    pub folder_playlists: Vec<FolderPlaylist>,
}

impl LibraryStructure {
    /// Every song, from albums and standalone alike. Used for indices and
    /// for driving full rescans/invariant checks.
    pub fn all_songs(&self) -> Vec<&SongMetadata> {
        let mut out: Vec<&SongMetadata> = self.standalone_songs.iter().collect();
        for album in self.albums.values() {
            out.extend(album.songs.iter());
        }
        out
    }

    pub fn find_song(&self, song_id: &str) -> Option<&SongMetadata> {
        self.standalone_songs
            .iter()
            .find(|s| s.id == song_id)
            .or_else(|| {
                self.albums
                    .values()
                    .flat_map(|a| a.songs.iter())
                    .find(|s| s.id == song_id)
            })
    }

    pub fn find_song_by_path(&self, path: &str) -> Option<&SongMetadata> {
        self.all_songs().into_iter().find(|s| s.path == path)
    }

    /// Mutable lookup used by lazy extraction paths (duration warm-up,
    /// on-demand duration/artwork fetches) to patch a song in place without
    /// rebuilding the whole structure.
    pub fn find_song_mut(&mut self, song_id: &str) -> Option<&mut SongMetadata> {
        if let Some(song) = self.standalone_songs.iter_mut().find(|s| s.id == song_id) {
            return Some(song);
        }
        self.albums
            .values_mut()
            .flat_map(|a| a.songs.iter_mut())
            .find(|s| s.id == song_id)
    }

    pub fn album_id_for_song(&self, song_id: &str) -> Option<String> {
        self.albums
            .values()
            .find(|a| a.songs.iter().any(|s| s.id == song_id))
            .map(|a| a.id.clone())
    }

    /// Disjointness property: no song id appears in both the standalone
    /// set and an album.
    pub fn is_disjoint(&self) -> bool {
        let standalone: HashSet<&str> = self.standalone_songs.iter().map(|s| s.id.as_str()).collect();
        let in_albums: HashSet<&str> = self
            .albums
            .values()
            .flat_map(|a| a.songs.iter().map(|s| s.id.as_str()))
            .collect();
        standalone.is_disjoint(&in_albums)
    }

    /// Whether every song known to the library already has a non-zero
    /// duration (the "durations-ready" predicate).
    pub fn durations_ready(&self) -> bool {
        self.all_songs()
            .iter()
            .all(|s| matches!(s.duration, Some(d) if d > 0))
    }
}

/// One observed filesystem change (§3 `FileChange`).
#[derive(Debug, Clone)]
pub enum FileChange {
    Added { path: String, at: DateTime<Utc> },
    Removed { path: String, at: DateTime<Utc> },
    Modified { path: String, at: DateTime<Utc> },
    Renamed { old_path: String, path: String, at: DateTime<Utc> },
}

impl FileChange {
    pub fn path(&self) -> &str {
        match self {
            FileChange::Added { path, .. }
            | FileChange::Removed { path, .. }
            | FileChange::Modified { path, .. }
            | FileChange::Renamed { path, .. } => path,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            FileChange::Added { at, .. }
            | FileChange::Removed { at, .. }
            | FileChange::Modified { at, .. }
            | FileChange::Renamed { at, .. } => *at,
        }
    }
}

/// A catalogue delta produced by the change processor (§4.I) and consumed by
/// the library manager's `apply_updates`.
#[derive(Debug, Clone, Default)]
pub struct LibraryUpdate {
    pub added: Vec<SongMetadata>,
    pub removed_ids: HashSet<String>,
    pub modified: Vec<SongMetadata>,
    pub affected_album_ids: HashSet<String>,
    pub at: Option<DateTime<Utc>>,
}

impl LibraryUpdate {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed_ids.is_empty() && self.modified.is_empty()
    }
}
