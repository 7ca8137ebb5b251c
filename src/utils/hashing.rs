//! Identity hashing (§3). Song, album and transcode-artifact keys are the
//! first 12 hex characters of an MD5 digest over a well-defined key string;
//! folder playlist IDs are the full digest, per §3's wording for each.

/// First 12 hex chars of `MD5(input)`.
fn md5_12(input: &str) -> String {
    let digest = md5::compute(input.as_bytes());
    format!("{digest:x}")[..12].to_string()
}

/// Song ID: `md5(absolute_path)[..12]`.
pub fn song_id(absolute_path: &str) -> String {
    md5_12(absolute_path)
}

/// Album ID: `md5(lower(album)|||lower(album_artist_or_artist))[..12]`.
///
/// `key` is expected to already be the lowercased, trimmed `album|||artist`
/// string produced by `Album::key_for`.
pub fn album_id(key: &str) -> String {
    md5_12(key)
}

/// Folder playlist ID: the full `md5(absolute_folder_path)` hex digest.
/// Unlike song/album/transcode keys, §3 does not qualify this one with
/// "first 12 hex chars" — it's the plain digest.
pub fn folder_id(absolute_folder_path: &str) -> String {
    format!("{:x}", md5::compute(absolute_folder_path.as_bytes()))
}

/// Transcoding cache artifact key stem: `hash(song_path)`.
pub fn transcode_key(absolute_song_path: &str) -> String {
    md5_12(absolute_song_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn song_id_is_stable_and_12_hex_chars() {
        let a = song_id("/music/a.mp3");
        let b = song_id("/music/a.mp3");
        assert_eq!(a, b);
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn album_id_matches_spec_example() {
        // scenario 2 in §8: album="Foo", artist="Bar" -> md5("foo|||bar")[..12]
        let expected = format!("{:x}", md5::compute(b"foo|||bar"))[..12].to_string();
        assert_eq!(album_id("foo|||bar"), expected);
    }

    #[test]
    fn different_paths_almost_certainly_differ() {
        assert_ne!(song_id("/a.mp3"), song_id("/b.mp3"));
    }

    #[test]
    fn folder_id_is_the_full_md5_digest() {
        let expected = format!("{:x}", md5::compute(b"/music/My Mix [PLAYLIST]"));
        assert_eq!(folder_id("/music/My Mix [PLAYLIST]"), expected);
        assert_eq!(expected.len(), 32);
    }
}
