//! Folder-based playlists (§3 `FolderPlaylist`, §4.D).

use serde::{Deserialize, Serialize};

use crate::utils::hashing::folder_id;

/// Marker substring that identifies a directory as a playlist folder.
pub const PLAYLIST_MARKER: &str = "[PLAYLIST]";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderPlaylist {
    pub id: String,
    pub name: String,
    pub folder_path: String,
    pub song_ids: Vec<String>,
}

impl FolderPlaylist {
    pub fn new(folder_path: String, song_ids: Vec<String>) -> Self {
        let id = folder_id(&folder_path);
        let base_name = std::path::Path::new(&folder_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&folder_path);
        let name = strip_marker(base_name);
        Self {
            id,
            name,
            folder_path,
            song_ids,
        }
    }
}

/// Strip the `[PLAYLIST]` marker (and surrounding whitespace) from a folder name.
pub fn strip_marker(name: &str) -> String {
    name.replace(PLAYLIST_MARKER, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_marker_and_trims() {
        assert_eq!(strip_marker("My Mix [PLAYLIST]"), "My Mix");
        assert_eq!(strip_marker("[PLAYLIST] Morning Drive"), "Morning Drive");
    }

    #[test]
    fn id_is_stable() {
        let p1 = FolderPlaylist::new("/music/My Mix [PLAYLIST]".into(), vec![]);
        let p2 = FolderPlaylist::new("/music/My Mix [PLAYLIST]".into(), vec!["a".into()]);
        assert_eq!(p1.id, p2.id);
        assert_eq!(p1.name, "My Mix");
    }
}
