//! Transcoding cache: resolves a `(song_path, quality)` pair to a readable
//! artifact path, encoding on a cache miss via the bundled ffmpeg. Bounded by
//! an on-disk byte budget enforced through LRU-by-access-time eviction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::CoreResult;
use crate::utils::hashing::transcode_key;

use super::ffmpeg;

const DEFAULT_BUDGET_BYTES: u64 = 2 * 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    High,
    Medium,
    Low,
}

impl Quality {
    pub fn as_str(self) -> &'static str {
        match self {
            Quality::High => "high",
            Quality::Medium => "medium",
            Quality::Low => "low",
        }
    }

    fn bitrate_kbps(self) -> Option<u32> {
        match self {
            Quality::High => None,
            Quality::Medium => Some(128),
            Quality::Low => Some(64),
        }
    }

    pub fn parse(raw: &str) -> Quality {
        match raw.to_lowercase().as_str() {
            "medium" => Quality::Medium,
            "low" => Quality::Low,
            _ => Quality::High,
        }
    }
}

/// Resolves `(song_path, quality)` to a file on disk, single-flighting
/// concurrent requests for the same key and enforcing a disk budget.
pub struct TranscodingCache {
    dir: PathBuf,
    budget_bytes: u64,
    locks: DashMap<String, Arc<AsyncMutex<()>>>,
    readers: DashMap<PathBuf, i32>,
    last_accessed: Mutex<HashMap<PathBuf, SystemTime>>,
    evictions_skipped: AtomicI64,
}

impl TranscodingCache {
    pub fn new(dir: PathBuf) -> Self {
        Self::with_budget(dir, DEFAULT_BUDGET_BYTES)
    }

    pub fn with_budget(dir: PathBuf, budget_bytes: u64) -> Self {
        let _ = std::fs::create_dir_all(&dir);
        Self {
            dir,
            budget_bytes,
            locks: DashMap::new(),
            readers: DashMap::new(),
            last_accessed: Mutex::new(HashMap::new()),
            evictions_skipped: AtomicI64::new(0),
        }
    }

    fn artifact_path(&self, song_path: &str, quality: Quality) -> PathBuf {
        self.dir.join(format!("{}-{}.m4a", transcode_key(song_path), quality.as_str()))
    }

    /// Resolve a readable path for streaming `song_path` at `quality`. High
    /// quality (and any quality when the encoder is unavailable) passes
    /// through the original file untouched.
    pub async fn resolve(&self, song_path: &Path, quality: Quality) -> CoreResult<PathBuf> {
        let bitrate = match quality.bitrate_kbps() {
            None => return Ok(song_path.to_path_buf()),
            Some(b) => b,
        };

        if !ffmpeg::is_ffmpeg_available() {
            tracing::warn!(
                "transcoder unavailable, degrading {} to high",
                song_path.display()
            );
            return Ok(song_path.to_path_buf());
        }

        let path_str = song_path.to_string_lossy().to_string();
        let key = format!("{}-{}", transcode_key(&path_str), quality.as_str());
        let artifact = self.artifact_path(&path_str, quality);

        if artifact.exists() {
            self.touch(&artifact);
            return Ok(artifact);
        }

        let lock = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Double-check: another task may have finished the encode while we
        // were waiting on the lock.
        if artifact.exists() {
            self.locks.remove(&key);
            self.touch(&artifact);
            return Ok(artifact);
        }

        let result = ffmpeg::transcode_audio(song_path, &artifact, "aac", Some(bitrate));
        self.locks.remove(&key);

        match result {
            Ok(()) => {
                self.touch(&artifact);
                self.enforce_budget();
                Ok(artifact)
            }
            Err(e) => {
                tracing::warn!("transcode failed for {}: {}, degrading to high", song_path.display(), e);
                Ok(song_path.to_path_buf())
            }
        }
    }

    fn touch(&self, artifact: &Path) {
        self.last_accessed.lock().insert(artifact.to_path_buf(), SystemTime::now());
    }

    /// Mark `path` as currently being read; eviction skips it until the
    /// matching `end_read` call.
    pub fn begin_read(&self, path: &Path) {
        *self.readers.entry(path.to_path_buf()).or_insert(0) += 1;
    }

    pub fn end_read(&self, path: &Path) {
        if let Some(mut count) = self.readers.get_mut(path) {
            *count -= 1;
        }
    }

    fn is_in_use(&self, path: &Path) -> bool {
        self.readers.get(path).map(|c| *c > 0).unwrap_or(false)
    }

    /// Evict least-recently-accessed artifacts until the directory is back
    /// under budget. Artifacts with an active reader are never evicted.
    fn enforce_budget(&self) {
        let entries: Vec<(PathBuf, u64)> = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd
                .filter_map(|e| e.ok())
                .filter_map(|e| e.metadata().ok().map(|m| (e.path(), m.len())))
                .collect(),
            Err(_) => return,
        };

        let mut total: u64 = entries.iter().map(|(_, size)| size).sum();
        if total <= self.budget_bytes {
            return;
        }

        let last_accessed = self.last_accessed.lock();
        let mut by_age: Vec<(PathBuf, u64, SystemTime)> = entries
            .into_iter()
            .map(|(path, size)| {
                let accessed = last_accessed.get(&path).copied().unwrap_or(SystemTime::UNIX_EPOCH);
                (path, size, accessed)
            })
            .collect();
        drop(last_accessed);
        by_age.sort_by_key(|(_, _, accessed)| *accessed);

        for (path, size, _) in by_age {
            if total <= self.budget_bytes {
                break;
            }
            if self.is_in_use(&path) {
                self.evictions_skipped.fetch_add(1, Ordering::Relaxed);
                continue;
            }
            if std::fs::remove_file(&path).is_ok() {
                self.last_accessed.lock().remove(&path);
                total = total.saturating_sub(size);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn high_quality_passes_through_without_encoding() {
        let dir = TempDir::new().unwrap();
        let cache = TranscodingCache::new(dir.path().to_path_buf());
        let song = dir.path().join("song.mp3");
        std::fs::write(&song, b"fake").unwrap();

        let resolved = tokio_test::block_on(cache.resolve(&song, Quality::High)).unwrap();
        assert_eq!(resolved, song);
    }

    #[test]
    fn reader_guarded_artifact_is_not_evicted() {
        let dir = TempDir::new().unwrap();
        let cache = TranscodingCache::with_budget(dir.path().to_path_buf(), 1);
        let artifact = dir.path().join("busy.m4a");
        std::fs::write(&artifact, vec![0u8; 1024]).unwrap();
        cache.touch(&artifact);
        cache.begin_read(&artifact);

        cache.enforce_budget();
        assert!(artifact.exists());

        cache.end_read(&artifact);
    }

    #[test]
    fn unguarded_oldest_artifact_is_evicted_over_budget() {
        let dir = TempDir::new().unwrap();
        let cache = TranscodingCache::with_budget(dir.path().to_path_buf(), 10);
        let artifact = dir.path().join("old.m4a");
        std::fs::write(&artifact, vec![0u8; 1024]).unwrap();
        cache.touch(&artifact);

        cache.enforce_budget();
        assert!(!artifact.exists());
    }
}
