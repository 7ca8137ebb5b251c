//! Metadata extractor. Extracts tags + duration for one file, with a
//! filename-heuristic fallback when tag parsing fails outright.

use std::path::Path;

use lofty::{Accessor, AudioFile, ItemKey, PictureType, Probe, TaggedFileExt};

use crate::error::{CoreError, CoreResult};
use crate::models::SongMetadata;
use crate::utils::filesystem::to_absolute_string;
use crate::utils::parsers::parse_filename;

use super::duration::parse_mp3_duration;

/// Extract metadata for a single audio file.
///
/// `strict`: when `true`, a hard tag-parsing failure propagates as
/// `CoreError::ExtractionFailed`; the default (soft-fail) path instead
/// returns a minimal record built from the filename.
pub fn extract(path: &Path, strict: bool) -> CoreResult<SongMetadata> {
    let meta = std::fs::metadata(path)?;
    let size_bytes = meta.len();
    let mtime_ms = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0);

    let absolute = to_absolute_string(path);

    let mut song = SongMetadata::new(absolute, size_bytes, mtime_ms);

    let tagged_file = match Probe::open(path).and_then(|p| p.read()) {
        Ok(f) => f,
        Err(e) => {
            if strict {
                return Err(CoreError::ExtractionFailed(path.to_path_buf()));
            }
            tracing::warn!("soft-failing extraction for {}: {}", path.display(), e);
            apply_filename_fallback(&mut song, path);
            return Ok(song);
        }
    };

    let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

    match tag {
        Some(t) => {
            song.title = t.title().map(|s| s.to_string());
            song.artist = t.artist().map(|s| s.to_string());
            song.album = t.album().map(|s| s.to_string());
            song.album_artist = t
                .get_string(&ItemKey::AlbumArtist)
                .map(|s| s.to_string());
            song.genre = t.genre().map(|s| s.to_string());
            song.comment = t.comment().map(|s| s.to_string());
            song.track_no = t.track();
            song.disc_no = t.disk();
            song.year = t.year().map(|y| y as i32);

            song.artwork = t
                .pictures()
                .iter()
                .find(|p| p.pic_type() == PictureType::CoverFront)
                .or_else(|| t.pictures().first())
                .map(|p| p.data().to_vec());
        }
        None => {
            apply_filename_fallback(&mut song, path);
        }
    }

    if song.title.is_none() {
        let (title, artist) = parse_filename(
            path.file_stem().and_then(|s| s.to_str()).unwrap_or("Unknown"),
        );
        song.title = Some(title);
        if song.artist.is_none() {
            song.artist = artist;
        }
    }

    let properties = tagged_file.properties();
    let lofty_duration = properties.duration().as_secs() as u32;
    song.duration = if lofty_duration > 0 {
        Some(lofty_duration)
    } else if path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("mp3")).unwrap_or(false) {
        parse_mp3_duration(path)
    } else {
        None
    };
    song.bitrate = properties.audio_bitrate();

    Ok(song)
}

fn apply_filename_fallback(song: &mut SongMetadata, path: &Path) {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("Unknown");
    let (title, artist) = parse_filename(stem);
    song.title = Some(title);
    song.artist = artist;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_fail_on_unreadable_file_produces_minimal_record() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"not audio").unwrap();
        let path = tmp.path().with_extension("mp3");
        std::fs::rename(tmp.path(), &path).unwrap();

        let result = extract(&path, false).unwrap();
        assert!(result.title.is_some());
        assert_eq!(result.path.len() > 0, true);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn strict_mode_propagates_failure() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"not audio").unwrap();
        let path = tmp.path().with_extension("mp3");
        std::fs::rename(tmp.path(), &path).unwrap();

        let result = extract(&path, true);
        assert!(result.is_err());

        let _ = std::fs::remove_file(&path);
    }
}
