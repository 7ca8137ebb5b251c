//! Album grouping (§3 `Album`, §4.F).

use serde::{Deserialize, Serialize};

use super::song::SongMetadata;
use crate::utils::hashing::album_id;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Album {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub year: Option<i32>,
    pub songs: Vec<SongMetadata>,
    /// Path to an artwork source, if one was found among the album's songs.
    pub artwork_song_id: Option<String>,
}

impl Album {
    /// An album is only valid (publicly visible) once it has at least two
    /// songs; singletons are demoted to standalone by the album builder.
    pub fn is_valid(&self) -> bool {
        self.songs.len() >= 2
    }

    pub fn duration_secs(&self) -> u32 {
        self.songs.iter().filter_map(|s| s.duration).sum()
    }

    /// Sort songs by `(disc_no ?? 1, track_no ?? 9999, title)` (§4.F).
    pub fn sort_songs(&mut self) {
        self.songs.sort_by(|a, b| {
            let da = a.disc_no.unwrap_or(1);
            let db = b.disc_no.unwrap_or(1);
            da.cmp(&db)
                .then_with(|| a.track_no.unwrap_or(9999).cmp(&b.track_no.unwrap_or(9999)))
                .then_with(|| a.display_title().cmp(&b.display_title()))
        });
    }

    /// Build the album key string from raw tag values, per §4.F.
    pub fn key_for(album: &str, album_artist_or_artist: &str) -> String {
        format!(
            "{}|||{}",
            album.trim().to_lowercase(),
            album_artist_or_artist.trim().to_lowercase()
        )
    }

    pub fn id_for_key(key: &str) -> String {
        album_id(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn album_id_depends_only_on_lowercased_trimmed_key() {
        let k1 = Album::key_for("Foo", "Bar");
        let k2 = Album::key_for("  foo ", " BAR ");
        assert_eq!(Album::id_for_key(&k1), Album::id_for_key(&k2));
    }

    #[test]
    fn singleton_album_is_invalid() {
        let album = Album {
            id: "x".into(),
            title: "T".into(),
            artist: "A".into(),
            year: None,
            songs: vec![SongMetadata::new("/a.mp3".into(), 1, 0)],
            artwork_song_id: None,
        };
        assert!(!album.is_valid());
    }
}
