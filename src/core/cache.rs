//! Persistent metadata cache: `path -> {mtime_ms, size_bytes, metadata}`,
//! serialized as one JSON document with a schema version. Saved via
//! write-to-temp-then-rename for atomicity; corrupt or missing files are
//! tolerated by starting empty (`CacheCorrupt`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreResult;
use crate::models::SongMetadata;

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub mtime_ms: i64,
    pub size_bytes: u64,
    /// Kept as a raw JSON value (not a typed `SongMetadata`) so that fields
    /// introduced by a newer schema version round-trip losslessly through a
    /// rewrite by this version.
    pub metadata: Value,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDocument {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    entries: HashMap<String, CacheRecord>,
}

fn default_version() -> u32 {
    SCHEMA_VERSION
}

/// The persistent metadata cache.
#[derive(Clone)]
pub struct MetadataCache {
    path: PathBuf,
    entries: HashMap<String, CacheRecord>,
}

impl MetadataCache {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            entries: HashMap::new(),
        }
    }

    /// Load the cache from disk. Missing or corrupt files start empty
    /// (`CacheCorrupt`); the corruption is logged once, not propagated.
    pub fn load(path: PathBuf) -> Self {
        if !path.exists() {
            return Self::new(path);
        }

        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("failed to read metadata cache at {}: {}", path.display(), e);
                return Self::new(path);
            }
        };

        match serde_json::from_str::<CacheDocument>(&content) {
            Ok(doc) => Self {
                path,
                entries: doc.entries,
            },
            Err(e) => {
                tracing::warn!("metadata cache at {} is corrupt ({}), resetting", path.display(), e);
                Self::new(path)
            }
        }
    }

    /// Atomic save: write to a temp file in the same directory, then rename.
    pub fn save(&self) -> CoreResult<()> {
        let doc = CacheDocument {
            version: SCHEMA_VERSION,
            entries: self.entries.clone(),
        };
        let content = serde_json::to_string_pretty(&doc)?;

        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let tmp_path = parent.join(format!(
            ".{}.tmp",
            self.path.file_name().and_then(|n| n.to_str()).unwrap_or("metadata_cache")
        ));
        std::fs::write(&tmp_path, content)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Entry lookup. Returns `None` on miss; the caller (scan orchestrator,
    /// change processor) decides freshness via `(mtime_ms, size_bytes)`.
    pub fn lookup(&self, path: &str) -> Option<&CacheRecord> {
        self.entries.get(path)
    }

    /// Freshness predicate: an entry is fresh iff `(mtime_ms, size_bytes)`
    /// equal the file's current stat.
    pub fn is_fresh(&self, path: &str, mtime_ms: i64, size_bytes: u64) -> bool {
        self.entries
            .get(path)
            .map(|e| e.mtime_ms == mtime_ms && e.size_bytes == size_bytes)
            .unwrap_or(false)
    }

    pub fn reconstruct(&self, path: &str) -> Option<SongMetadata> {
        let record = self.entries.get(path)?;
        serde_json::from_value(record.metadata.clone()).ok()
    }

    pub fn update(&mut self, path: String, song: &SongMetadata) {
        let metadata = serde_json::to_value(song).unwrap_or(Value::Null);
        self.entries.insert(
            path,
            CacheRecord {
                mtime_ms: song.mtime_ms,
                size_bytes: song.size_bytes,
                metadata,
            },
        );
    }

    /// Update just the duration field of an existing cache entry, without
    /// disturbing anything else stored in its JSON blob.
    pub fn update_duration(&mut self, path: &str, seconds: u32) {
        if let Some(record) = self.entries.get_mut(path) {
            if let Value::Object(map) = &mut record.metadata {
                map.insert("duration".to_string(), Value::from(seconds));
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge another cache's entries into this one (used by the scan
    /// orchestrator to fold freshly-extracted records back in).
    pub fn merge(&mut self, other: HashMap<String, CacheRecord>) {
        self.entries.extend(other);
    }

    pub fn entries(&self) -> &HashMap<String, CacheRecord> {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_song(path: &str) -> SongMetadata {
        let mut s = SongMetadata::new(path.to_string(), 100, 1000);
        s.title = Some("T".to_string());
        s
    }

    #[test]
    fn round_trips_unchanged_mtime_and_size() {
        let dir = TempDir::new().unwrap();
        let cache_path = dir.path().join("cache.json");

        let mut cache = MetadataCache::new(cache_path.clone());
        let song = sample_song("/music/a.mp3");
        cache.update("/music/a.mp3".to_string(), &song);
        cache.save().unwrap();

        let loaded = MetadataCache::load(cache_path);
        assert!(loaded.is_fresh("/music/a.mp3", 1000, 100));
        let reconstructed = loaded.reconstruct("/music/a.mp3").unwrap();
        assert_eq!(reconstructed.title, song.title);
        assert_eq!(reconstructed.id, song.id);
    }

    #[test]
    fn corrupt_file_resets_to_empty() {
        let dir = TempDir::new().unwrap();
        let cache_path = dir.path().join("cache.json");
        std::fs::write(&cache_path, "{not valid json").unwrap();

        let cache = MetadataCache::load(cache_path);
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let cache_path = dir.path().join("nonexistent.json");
        let cache = MetadataCache::load(cache_path);
        assert!(cache.is_empty());
    }

    #[test]
    fn update_duration_preserves_other_fields() {
        let mut cache = MetadataCache::new(PathBuf::from("/tmp/unused.json"));
        let song = sample_song("/music/a.mp3");
        cache.update("/music/a.mp3".to_string(), &song);
        cache.update_duration("/music/a.mp3", 42);

        let reconstructed = cache.reconstruct("/music/a.mp3").unwrap();
        assert_eq!(reconstructed.duration, Some(42));
        assert_eq!(reconstructed.title, song.title);
    }
}
