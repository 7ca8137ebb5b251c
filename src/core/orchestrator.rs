//! Scan orchestrator: runs the scanner, extractor, dedup and album builder
//! as one worker unit, reporting progress and folding results back into the
//! metadata cache.

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::error::CoreResult;
use crate::models::{FolderPlaylist, LibraryStructure, SongMetadata};

use super::albums::build_albums;
use super::cache::MetadataCache;
use super::dedup::dedup;
use super::extractor::extract;
use super::scanner::{group_by_playlist, scan};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStage {
    Collecting,
    Metadata,
    Duplicates,
    Albums,
}

impl ScanStage {
    fn range(self) -> (f32, f32) {
        match self {
            ScanStage::Collecting => (0.0, 10.0),
            ScanStage::Metadata => (10.0, 70.0),
            ScanStage::Duplicates => (70.0, 85.0),
            ScanStage::Albums => (85.0, 100.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanProgress {
    pub stage: ScanStage,
    pub current: usize,
    pub total: usize,
    pub percentage: f32,
    pub message: String,
}

impl ScanProgress {
    fn new(stage: ScanStage, current: usize, total: usize, message: impl Into<String>) -> Self {
        let (lo, hi) = stage.range();
        let fraction = if total == 0 { 1.0 } else { current as f32 / total as f32 };
        let percentage = lo + fraction * (hi - lo);
        Self {
            stage,
            current,
            total,
            percentage,
            message: message.into(),
        }
    }
}

/// Result of one complete scan pass.
pub struct ScanOutcome {
    pub library: LibraryStructure,
    pub cache_hits: usize,
    pub cache_misses: usize,
}

/// Batch size for parallel metadata extraction, tied to detected CPU count.
fn batch_size() -> usize {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    match cpus {
        0..=2 => 8,
        3..=4 => 15,
        5..=8 => 25,
        _ => 35,
    }
}

/// Run a full scan of `root`, reporting progress through `on_progress`.
///
/// The supplied `cache` is consulted for each file and updated in place with
/// fresh extractions; callers are responsible for calling `cache.save()`
/// afterward (the caller also owns when that I/O happens relative to the
/// rest of the worker's lifecycle).
pub fn run_scan(
    root: &Path,
    cache: &mut MetadataCache,
    mut on_progress: impl FnMut(ScanProgress),
) -> CoreResult<ScanOutcome> {
    tracing::info!("scan starting at {}", root.display());

    on_progress(ScanProgress::new(ScanStage::Collecting, 0, 1, "walking directory tree"));
    let scan_result = scan(root);
    let total_files = scan_result.files.len();
    on_progress(ScanProgress::new(ScanStage::Collecting, 1, 1, format!("found {total_files} files")));

    let (standalone_paths, playlist_groups) = group_by_playlist(&scan_result);

    let all_paths: Vec<PathBuf> = standalone_paths
        .iter()
        .map(|p| p.to_path_buf())
        .chain(playlist_groups.values().flatten().map(|p| p.to_path_buf()))
        .collect();

    let batch = batch_size();
    let mut extracted = Vec::with_capacity(all_paths.len());
    let mut cache_hits = 0usize;
    let mut cache_misses = 0usize;

    for (chunk_idx, chunk) in all_paths.chunks(batch).enumerate() {
        let results: Vec<(PathBuf, SongMetadata, bool)> = chunk
            .par_iter()
            .map(|path| extract_with_cache(path, cache))
            .collect();

        for (_, song, was_hit) in &results {
            if *was_hit {
                cache_hits += 1;
            } else {
                cache_misses += 1;
            }
        }

        for (_, song, _) in &results {
            // Key on `song.path` (already the canonical string `extract_with_cache`
            // looked it up under), not the raw walk path — otherwise a
            // non-canonical root/symlink means writes and reads never agree
            // on a key and nothing is ever a cache hit.
            cache.update(song.path.clone(), song);
        }

        extracted.extend(results.into_iter().map(|(_, song, _)| song));

        let processed = ((chunk_idx + 1) * batch).min(all_paths.len());
        on_progress(ScanProgress::new(
            ScanStage::Metadata,
            processed,
            all_paths.len(),
            format!("extracted {processed}/{}", all_paths.len()),
        ));
    }

    on_progress(ScanProgress::new(ScanStage::Duplicates, 0, 1, "deduplicating"));
    let deduplicated = dedup(extracted);
    on_progress(ScanProgress::new(ScanStage::Duplicates, 1, 1, format!("{} unique songs", deduplicated.len())));

    on_progress(ScanProgress::new(ScanStage::Albums, 0, 1, "grouping albums"));
    let build_result = build_albums(deduplicated);
    let mut albums = std::collections::HashMap::new();
    for album in build_result.albums {
        albums.insert(album.id.clone(), album);
    }

    let folder_playlists = playlist_groups
        .keys()
        .map(|folder| build_folder_playlist(folder, &albums, &build_result.standalone))
        .collect();

    let library = LibraryStructure {
        albums,
        standalone_songs: build_result.standalone,
        folder_playlists,
    };
    on_progress(ScanProgress::new(ScanStage::Albums, 1, 1, "scan complete"));

    tracing::info!(
        "scan complete: {} songs, {} albums, {} cache hits, {} cache misses",
        total_files,
        library.albums.len(),
        cache_hits,
        cache_misses
    );

    Ok(ScanOutcome {
        library,
        cache_hits,
        cache_misses,
    })
}

fn extract_with_cache(path: &Path, cache: &MetadataCache) -> (PathBuf, SongMetadata, bool) {
    let path_str = crate::utils::filesystem::to_absolute_string(path);

    if let Ok(meta) = std::fs::metadata(path) {
        let size_bytes = meta.len();
        let mtime_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        if cache.is_fresh(&path_str, mtime_ms, size_bytes) {
            if let Some(song) = cache.reconstruct(&path_str) {
                return (path.to_path_buf(), song, true);
            }
        }
    }

    let song = extract(path, false).unwrap_or_else(|_| SongMetadata::new(path_str, 0, 0));
    (path.to_path_buf(), song, false)
}

fn build_folder_playlist(
    folder: &Path,
    albums: &std::collections::HashMap<String, crate::models::Album>,
    standalone: &[SongMetadata],
) -> FolderPlaylist {
    let absolute = crate::utils::filesystem::to_absolute_string(folder);

    let song_ids = standalone
        .iter()
        .chain(albums.values().flat_map(|a| a.songs.iter()))
        .filter(|s| Path::new(&s.path).starts_with(folder))
        .map(|s| s.id.clone())
        .collect();

    FolderPlaylist::new(absolute, song_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn empty_folder_scan_yields_empty_library() {
        let dir = TempDir::new().unwrap();
        let mut cache = MetadataCache::new(dir.path().join("cache.json"));
        let mut events = Vec::new();
        let outcome = run_scan(dir.path(), &mut cache, |p| events.push(p)).unwrap();

        assert!(outcome.library.albums.is_empty());
        assert!(outcome.library.standalone_songs.is_empty());
        assert!(!events.is_empty());
        assert_eq!(events.last().unwrap().percentage, 100.0);
    }

    #[test]
    fn batch_size_follows_cpu_tiers() {
        assert_eq!(
            match 1u32 {
                0..=2 => 8,
                3..=4 => 15,
                5..=8 => 25,
                _ => 35,
            },
            8
        );
    }
}
