//! Album builder: groups songs into albums by `(album, album artist)`,
//! demoting singleton groups back to standalone songs.

use std::collections::HashMap;

use crate::models::{Album, SongMetadata};

/// Output of grouping: valid (2+ song) albums, plus songs that didn't belong
/// to one (either because they carry no album tag, or their album group
/// only had one song).
pub struct AlbumBuildResult {
    pub albums: Vec<Album>,
    pub standalone: Vec<SongMetadata>,
}

/// Group `songs` (already deduplicated) into albums.
///
/// Grouping key is `Album::key_for(album, effective_album_artist)`. A group
/// of size 1 is not a real album — it's demoted to a standalone song, so the
/// standalone and album song sets stay disjoint by construction.
pub fn build_albums(songs: Vec<SongMetadata>) -> AlbumBuildResult {
    let mut groups: HashMap<String, Vec<SongMetadata>> = HashMap::new();
    let mut standalone = Vec::new();

    for song in songs {
        if !song.has_album() {
            standalone.push(song);
            continue;
        }
        let key = Album::key_for(
            song.album.as_deref().unwrap_or(""),
            song.effective_album_artist(),
        );
        groups.entry(key).or_default().push(song);
    }

    let mut albums = Vec::new();
    for (key, mut group_songs) in groups {
        if group_songs.len() < 2 {
            standalone.extend(group_songs);
            continue;
        }

        // Title/artist come from the first song encountered for the group,
        // matching insertion order (the dedup pass already picked winners).
        let first = &group_songs[0];
        let title = first.album.clone().unwrap_or_else(|| "Unknown Album".to_string());
        let artist = first.effective_album_artist().to_string();
        let year = group_songs.iter().find_map(|s| s.year);
        let artwork_song_id = group_songs
            .iter()
            .find(|s| s.artwork.is_some())
            .map(|s| s.id.clone());

        let mut album = Album {
            id: Album::id_for_key(&key),
            title,
            artist,
            year,
            songs: std::mem::take(&mut group_songs),
            artwork_song_id,
        };
        album.sort_songs();
        albums.push(album);
    }

    AlbumBuildResult { albums, standalone }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(path: &str, title: &str, artist: &str, album: Option<&str>, track: Option<u32>) -> SongMetadata {
        let mut s = SongMetadata::new(path.to_string(), 1, 0);
        s.title = Some(title.to_string());
        s.artist = Some(artist.to_string());
        s.album = album.map(|a| a.to_string());
        s.track_no = track;
        s
    }

    #[test]
    fn groups_multi_song_album() {
        let songs = vec![
            song("/a1.mp3", "Track 1", "A", Some("Greatest Hits"), Some(1)),
            song("/a2.mp3", "Track 2", "A", Some("Greatest Hits"), Some(2)),
        ];
        let result = build_albums(songs);
        assert_eq!(result.albums.len(), 1);
        assert!(result.standalone.is_empty());
        assert_eq!(result.albums[0].songs[0].track_no, Some(1));
        assert_eq!(result.albums[0].songs[1].track_no, Some(2));
    }

    #[test]
    fn singleton_album_group_demotes_to_standalone() {
        let songs = vec![song("/a1.mp3", "Solo", "A", Some("One Off"), Some(1))];
        let result = build_albums(songs);
        assert!(result.albums.is_empty());
        assert_eq!(result.standalone.len(), 1);
    }

    #[test]
    fn songs_without_album_tag_are_standalone() {
        let songs = vec![song("/a1.mp3", "Loose", "A", None, None)];
        let result = build_albums(songs);
        assert!(result.albums.is_empty());
        assert_eq!(result.standalone.len(), 1);
    }

    #[test]
    fn standalone_and_album_sets_are_disjoint() {
        let songs = vec![
            song("/a1.mp3", "Track 1", "A", Some("Album"), Some(1)),
            song("/a2.mp3", "Track 2", "A", Some("Album"), Some(2)),
            song("/b1.mp3", "Loner", "B", Some("Solo Single"), Some(1)),
        ];
        let result = build_albums(songs);
        let album_ids: std::collections::HashSet<_> =
            result.albums.iter().flat_map(|a| a.songs.iter().map(|s| s.id.clone())).collect();
        let standalone_ids: std::collections::HashSet<_> =
            result.standalone.iter().map(|s| s.id.clone()).collect();
        assert!(album_ids.is_disjoint(&standalone_ids));
        assert_eq!(result.standalone.len(), 1);
    }

    #[test]
    fn different_artists_same_album_name_split_into_separate_albums() {
        let songs = vec![
            song("/a1.mp3", "T1", "Artist A", Some("Compilation"), Some(1)),
            song("/a2.mp3", "T2", "Artist A", Some("Compilation"), Some(2)),
            song("/b1.mp3", "T1", "Artist B", Some("Compilation"), Some(1)),
            song("/b2.mp3", "T2", "Artist B", Some("Compilation"), Some(2)),
        ];
        let result = build_albums(songs);
        assert_eq!(result.albums.len(), 2);
    }
}
