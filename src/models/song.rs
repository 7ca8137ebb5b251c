//! Song metadata — the atomic unit of the catalogue.

use serde::{Deserialize, Serialize};

use crate::utils::hashing::song_id;

/// Metadata for a single audio file.
///
/// Identity is derived purely from the absolute file path (§3 `SongMetadata`);
/// two `SongMetadata` values with equal `path` always carry the same `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongMetadata {
    pub id: String,
    pub path: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<i32>,
    pub track_no: Option<u32>,
    pub disc_no: Option<u32>,
    pub genre: Option<String>,
    pub comment: Option<String>,
    /// Duration in whole seconds. `None`/`Some(0)` both mean "not yet known" to
    /// the library manager's lazy extraction (§4.H); the cache stores whatever
    /// was last computed.
    pub duration: Option<u32>,
    pub bitrate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork: Option<Vec<u8>>,
    pub size_bytes: u64,
    pub mtime_ms: i64,
}

impl SongMetadata {
    /// Build a new record, deriving the stable ID from `path`.
    ///
    /// `path` must be absolute (§3 invariant); callers are expected to have
    /// canonicalized it already (the scanner and change processor both do).
    pub fn new(path: String, size_bytes: u64, mtime_ms: i64) -> Self {
        let id = song_id(&path);
        Self {
            id,
            path,
            title: None,
            artist: None,
            album_artist: None,
            album: None,
            year: None,
            track_no: None,
            disc_no: None,
            genre: None,
            comment: None,
            duration: None,
            bitrate: None,
            artwork: None,
            size_bytes,
            mtime_ms,
        }
    }

    /// The key used by the album builder (§4.F): `album_artist` falling back
    /// to `artist` falling back to `"Unknown Artist"`.
    pub fn effective_album_artist(&self) -> &str {
        self.album_artist
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or(self.artist.as_deref())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or("Unknown Artist")
    }

    pub fn has_album(&self) -> bool {
        self.album.as_deref().map(|a| !a.trim().is_empty()).unwrap_or(false)
    }

    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| {
            std::path::Path::new(&self.path)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Unknown")
                .to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_stable_for_equal_paths() {
        let a = SongMetadata::new("/music/a.mp3".to_string(), 10, 0);
        let b = SongMetadata::new("/music/a.mp3".to_string(), 99, 123);
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn effective_album_artist_falls_back() {
        let mut s = SongMetadata::new("/m/a.mp3".to_string(), 1, 0);
        assert_eq!(s.effective_album_artist(), "Unknown Artist");
        s.artist = Some("Foo".to_string());
        assert_eq!(s.effective_album_artist(), "Foo");
        s.album_artist = Some("Bar".to_string());
        assert_eq!(s.effective_album_artist(), "Bar");
    }
}
