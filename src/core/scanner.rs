//! File scanner: two-pass recursive walk producing audio file paths
//! grouped by playlist folder (or none), plus the playlist folders themselves.
//! Symlinks are never followed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::models::PLAYLIST_MARKER;
use crate::utils::filesystem::is_audio_file;

/// Result of a scan: every audio file found, with an optional playlist
/// folder it belongs to, plus the list of playlist folders themselves (for
/// folders with zero matching audio files, which still register as empty
/// playlists).
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Audio file path -> playlist folder path, if the file lives under one.
    pub files: Vec<(PathBuf, Option<PathBuf>)>,
    pub playlist_folders: Vec<PathBuf>,
}

/// Walk `root` and classify every audio file by the playlist folder (if any)
/// it is nested under.
pub fn scan(root: &Path) -> ScanResult {
    let playlist_folders = find_playlist_folders(root);

    let mut files = Vec::new();
    let walker = WalkDir::new(root).follow_links(false).into_iter();

    for entry in walker.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_file() || !is_audio_file(path) {
            continue;
        }

        let owning_playlist = playlist_folders
            .iter()
            .find(|folder| path.starts_with(folder))
            .cloned();

        files.push((path.to_path_buf(), owning_playlist));
    }

    ScanResult {
        files,
        playlist_folders,
    }
}

/// First pass: every directory whose base name contains the
/// `[PLAYLIST]` marker and is not nested inside an already-registered
/// playlist directory.
///
/// Collecting every marker directory and only afterward dropping the nested
/// ones avoids mutating `found` while a `filter_entry` closure still holds it
/// borrowed for the walk's lifetime.
fn find_playlist_folders(root: &Path) -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_dir() && entry.path() != root)
        .filter(|entry| entry.file_name().to_string_lossy().contains(PLAYLIST_MARKER))
        .map(|entry| entry.path().to_path_buf())
        .collect();

    // Shallowest first, so an ancestor is always accepted before its descendants.
    candidates.sort_by_key(|p| p.components().count());

    let mut accepted: Vec<PathBuf> = Vec::new();
    for candidate in candidates {
        if !accepted.iter().any(|f| candidate.starts_with(f)) {
            accepted.push(candidate);
        }
    }
    accepted
}

/// Group scan results by playlist folder, preserving discovery order within
/// each group.
pub fn group_by_playlist(result: &ScanResult) -> (Vec<&Path>, HashMap<PathBuf, Vec<&Path>>) {
    let mut standalone = Vec::new();
    let mut by_playlist: HashMap<PathBuf, Vec<&Path>> = HashMap::new();

    for (path, playlist) in &result.files {
        match playlist {
            Some(folder) => by_playlist.entry(folder.clone()).or_default().push(path.as_path()),
            None => standalone.push(path.as_path()),
        }
    }

    (standalone, by_playlist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"fake").unwrap();
    }

    #[test]
    fn empty_folder_yields_no_files() {
        let dir = TempDir::new().unwrap();
        let result = scan(dir.path());
        assert!(result.files.is_empty());
        assert!(result.playlist_folders.is_empty());
    }

    #[test]
    fn detects_playlist_folder_and_assigns_its_songs() {
        let dir = TempDir::new().unwrap();
        let playlist_dir = dir.path().join("My Mix [PLAYLIST]");
        touch(&playlist_dir.join("a.mp3"));
        touch(&playlist_dir.join("b.mp3"));
        touch(&dir.path().join("standalone.mp3"));

        let result = scan(dir.path());
        assert_eq!(result.playlist_folders.len(), 1);
        assert_eq!(result.files.len(), 3);

        let (standalone, by_playlist) = group_by_playlist(&result);
        assert_eq!(standalone.len(), 1);
        assert_eq!(by_playlist.values().next().unwrap().len(), 2);
    }

    #[test]
    fn nested_playlist_markers_do_not_double_register() {
        let dir = TempDir::new().unwrap();
        let outer = dir.path().join("Outer [PLAYLIST]");
        let inner = outer.join("Inner [PLAYLIST]");
        touch(&inner.join("a.mp3"));

        let result = scan(dir.path());
        assert_eq!(result.playlist_folders.len(), 1);
        assert_eq!(result.playlist_folders[0], outer);
    }

    #[test]
    fn ignores_non_audio_files() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("song.mp3"));

        let result = scan(dir.path());
        assert_eq!(result.files.len(), 1);
    }
}
