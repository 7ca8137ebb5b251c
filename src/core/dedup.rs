//! Duplicate detector. Groups equivalent songs and keeps exactly one
//! representative per group.

use std::collections::HashMap;

use crate::models::SongMetadata;

const DURATION_TOLERANCE_SECS: i64 = 2;

/// Equivalence key: lowercased, trimmed `(title, artist, album)`. Duration
/// closeness is checked separately since it isn't a clean hash key.
fn equivalence_key(song: &SongMetadata) -> (String, String, String) {
    (
        song.display_title().trim().to_lowercase(),
        song.artist.as_deref().unwrap_or("").trim().to_lowercase(),
        song.album.as_deref().unwrap_or("").trim().to_lowercase(),
    )
}

/// Deduplicate `songs`, keeping one representative per equivalence class.
///
/// Equivalence: same lowercased trimmed `(title, artist, album)` AND
/// `|duration_a - duration_b| <= 2s` when both durations are known (songs
/// with an unknown duration on either side still match on the text key
/// alone, since the closeness check only applies when both are known).
///
/// Tie-break within a class: highest bitrate, then larger file size, then
/// lexicographically smaller path.
pub fn dedup(songs: Vec<SongMetadata>) -> Vec<SongMetadata> {
    let mut groups: HashMap<(String, String, String), Vec<SongMetadata>> = HashMap::new();

    for song in songs {
        groups.entry(equivalence_key(&song)).or_default().push(song);
    }

    let mut result = Vec::new();
    for (_, mut bucket) in groups {
        result.extend(split_by_duration_and_pick(&mut bucket));
    }
    result
}

/// Within one text-equivalence bucket, further split by duration proximity
/// (songs whose durations differ by more than 2s are NOT equivalent, even
/// though their text key matches) and pick one representative per cluster.
fn split_by_duration_and_pick(bucket: &mut Vec<SongMetadata>) -> Vec<SongMetadata> {
    let mut clusters: Vec<Vec<SongMetadata>> = Vec::new();

    'outer: for song in bucket.drain(..) {
        for cluster in clusters.iter_mut() {
            let matches = cluster.iter().all(|other| match (song.duration, other.duration) {
                (Some(a), Some(b)) => (a as i64 - b as i64).abs() <= DURATION_TOLERANCE_SECS,
                _ => true,
            });
            if matches {
                cluster.push(song);
                continue 'outer;
            }
        }
        clusters.push(vec![song]);
    }

    clusters.into_iter().map(|cluster| pick_representative(cluster)).collect()
}

fn pick_representative(mut cluster: Vec<SongMetadata>) -> SongMetadata {
    cluster.sort_by(|a, b| {
        b.bitrate
            .unwrap_or(0)
            .cmp(&a.bitrate.unwrap_or(0))
            .then_with(|| b.size_bytes.cmp(&a.size_bytes))
            .then_with(|| a.path.cmp(&b.path))
    });
    cluster.into_iter().next().expect("cluster is never empty")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(path: &str, title: &str, artist: &str, album: &str, bitrate: Option<u32>, size: u64, dur: Option<u32>) -> SongMetadata {
        let mut s = SongMetadata::new(path.to_string(), size, 0);
        s.title = Some(title.to_string());
        s.artist = Some(artist.to_string());
        s.album = Some(album.to_string());
        s.bitrate = bitrate;
        s.duration = dur;
        s
    }

    #[test]
    fn keeps_highest_bitrate_representative() {
        let songs = vec![
            song("/a.mp3", "T", "A", "Alb", Some(128), 1000, Some(200)),
            song("/b.mp3", "T", "A", "Alb", Some(320), 2000, Some(200)),
        ];
        let result = dedup(songs);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path, "/b.mp3");
    }

    #[test]
    fn duration_outside_tolerance_keeps_both() {
        let songs = vec![
            song("/a.mp3", "T", "A", "Alb", Some(128), 1000, Some(100)),
            song("/b.mp3", "T", "A", "Alb", Some(128), 1000, Some(200)),
        ];
        let result = dedup(songs);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn tie_break_prefers_smaller_path_when_bitrate_and_size_tie() {
        let songs = vec![
            song("/z.mp3", "T", "A", "Alb", Some(128), 1000, None),
            song("/a.mp3", "T", "A", "Alb", Some(128), 1000, None),
        ];
        let result = dedup(songs);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].path, "/a.mp3");
    }

    #[test]
    fn dedup_is_idempotent() {
        let songs = vec![
            song("/a.mp3", "T", "A", "Alb", Some(128), 1000, Some(200)),
            song("/b.mp3", "T", "A", "Alb", Some(320), 2000, Some(200)),
            song("/c.mp3", "Other", "X", "Y", None, 500, None),
        ];
        let once = dedup(songs);
        let twice = dedup(once.clone());
        let mut once_paths: Vec<_> = once.iter().map(|s| s.path.clone()).collect();
        let mut twice_paths: Vec<_> = twice.iter().map(|s| s.path.clone()).collect();
        once_paths.sort();
        twice_paths.sort();
        assert_eq!(once_paths, twice_paths);
    }
}
