//! Filename-heuristic parsing used as the extractor's fallback (§4.B) when a
//! file carries no usable tag data.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Leading track-number prefixes: "01 - ", "01.", "01_", "01)".
    static ref LEADING_TRACK_NO: Regex = Regex::new(r"^\s*\d{1,3}[\s\-\._\)]+").unwrap();
    // "Artist - Title" style filenames.
    static ref ARTIST_TITLE_SEP: Regex = Regex::new(r"\s+-\s+").unwrap();
}

/// Best-effort `(title, artist)` guess from a bare filename, with no tag
/// data to go on. Always returns a usable title; artist is `None` when the
/// filename gives no clear separator.
pub fn parse_filename(stem: &str) -> (String, Option<String>) {
    let cleaned = LEADING_TRACK_NO.replace(stem, "").replace('_', " ");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let cleaned = cleaned.trim();

    if let Some(mat) = ARTIST_TITLE_SEP.find(cleaned) {
        let artist = cleaned[..mat.start()].trim();
        let title = cleaned[mat.end()..].trim();
        if !artist.is_empty() && !title.is_empty() {
            return (title.to_string(), Some(artist.to_string()));
        }
    }

    let title = if cleaned.is_empty() {
        stem.to_string()
    } else {
        cleaned.to_string()
    };
    (title, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_leading_track_number() {
        let (title, artist) = parse_filename("03 - Lonely Road");
        assert_eq!(artist, None);
        assert_eq!(title, "Lonely Road");
    }

    #[test]
    fn splits_artist_and_title() {
        let (title, artist) = parse_filename("Daft Punk - One More Time");
        assert_eq!(artist.as_deref(), Some("Daft Punk"));
        assert_eq!(title, "One More Time");
    }

    #[test]
    fn falls_back_to_raw_stem_when_empty_after_cleanup() {
        let (title, _) = parse_filename("01");
        assert_eq!(title, "01");
    }

    #[test]
    fn replaces_underscores() {
        let (title, _) = parse_filename("Some_Great_Song");
        assert_eq!(title, "Some Great Song");
    }
}
