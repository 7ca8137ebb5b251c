//! Client media cache (§3 `CacheEntry`, §6 `<app-data>/cache/{artwork,songs}/`):
//! tracks artwork/song files the paired client has downloaded locally, bounded
//! by an LRU-by-last-access byte budget. Persisted the same way as the
//! metadata cache (`core::cache`) and evicted the same way as the
//! transcoding cache (`core::transcode`) — both patterns reused here rather
//! than invented fresh.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::models::{CacheEntry, CacheEntryKind};

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexDocument {
    entries: HashMap<String, CacheEntry>,
}

/// Bounded local cache of downloaded artwork/song bytes. One instance covers
/// both kinds; eviction weighs them together against a single byte budget,
/// matching the "artwork 30s / song 10min timeout, otherwise opaque bytes"
/// treatment in §5 — the cache itself doesn't distinguish kinds for sizing.
pub struct MediaCache {
    index_path: PathBuf,
    budget_bytes: u64,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MediaCache {
    /// Load the persisted index, then drop any entry whose backing file is
    /// gone (§7 `ArtifactMissing`: removed silently, logged once per orphan).
    pub fn load(index_path: PathBuf, budget_bytes: u64) -> Self {
        let mut entries = load_index(&index_path);
        let orphans: Vec<String> = entries
            .iter()
            .filter(|(_, e)| !e.backing_file_exists())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &orphans {
            tracing::warn!("media cache entry {} is orphaned (backing file missing), dropping", id);
            entries.remove(id);
        }

        let cache = Self {
            index_path,
            budget_bytes,
            entries: RwLock::new(entries),
        };
        if !orphans.is_empty() {
            let _ = cache.save();
        }
        cache
    }

    pub fn get_path(&self, id: &str) -> Option<PathBuf> {
        let mut entries = self.entries.write();
        let entry = entries.get_mut(id)?;
        if !entry.backing_file_exists() {
            entries.remove(id);
            return None;
        }
        entry.last_accessed = chrono::Utc::now();
        Some(PathBuf::from(&entry.path))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.read().contains_key(id)
    }

    /// Record a freshly-written file, then enforce the budget (an insert can
    /// push the cache over, so eviction always follows immediately).
    pub fn insert(&self, id: String, kind: CacheEntryKind, path: &Path, size_bytes: u64) {
        let entry = CacheEntry::new(id.clone(), kind, path.to_string_lossy().to_string(), size_bytes);
        self.entries.write().insert(id, entry);
        self.enforce_budget();
        let _ = self.save();
    }

    pub fn remove(&self, id: &str) {
        if let Some(entry) = self.entries.write().remove(id) {
            let _ = std::fs::remove_file(&entry.path);
        }
        let _ = self.save();
    }

    pub fn clear(&self) {
        let entries: Vec<CacheEntry> = self.entries.write().drain().map(|(_, e)| e).collect();
        for entry in entries {
            let _ = std::fs::remove_file(&entry.path);
        }
        let _ = self.save();
    }

    pub fn total_bytes(&self) -> u64 {
        self.entries.read().values().map(|e| e.size_bytes).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Evict least-recently-accessed entries until back under budget.
    fn enforce_budget(&self) {
        let mut entries = self.entries.write();
        let mut total: u64 = entries.values().map(|e| e.size_bytes).sum();
        if total <= self.budget_bytes {
            return;
        }

        let mut by_age: Vec<(String, chrono::DateTime<chrono::Utc>)> =
            entries.iter().map(|(id, e)| (id.clone(), e.last_accessed)).collect();
        by_age.sort_by_key(|(_, accessed)| *accessed);

        for (id, _) in by_age {
            if total <= self.budget_bytes {
                break;
            }
            if let Some(entry) = entries.remove(&id) {
                let _ = std::fs::remove_file(&entry.path);
                total = total.saturating_sub(entry.size_bytes);
            }
        }
    }

    fn save(&self) -> CoreResult<()> {
        let doc = IndexDocument {
            entries: self.entries.read().clone(),
        };
        let content = serde_json::to_string_pretty(&doc)?;
        let parent = self.index_path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let tmp = parent.join(".media_cache_index.json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.index_path)?;
        Ok(())
    }
}

fn load_index(path: &Path) -> HashMap<String, CacheEntry> {
    if !path.exists() {
        return HashMap::new();
    }
    match std::fs::read_to_string(path) {
        Ok(content) => serde_json::from_str::<IndexDocument>(&content)
            .map(|d| d.entries)
            .unwrap_or_default(),
        Err(_) => HashMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(path: &Path, bytes: &[u8]) {
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn orphaned_entries_are_dropped_at_load() {
        let dir = TempDir::new().unwrap();
        let index_path = dir.path().join("index.json");
        let missing_path = dir.path().join("gone.jpg");

        let mut entries = HashMap::new();
        entries.insert(
            "a".to_string(),
            CacheEntry::new("a".into(), CacheEntryKind::Artwork, missing_path.to_string_lossy().to_string(), 10),
        );
        let doc = IndexDocument { entries };
        std::fs::write(&index_path, serde_json::to_string(&doc).unwrap()).unwrap();

        let cache = MediaCache::load(index_path, 1_000_000);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn valid_entry_survives_load() {
        let dir = TempDir::new().unwrap();
        let index_path = dir.path().join("index.json");
        let song_path = dir.path().join("song.mp3");
        write_file(&song_path, b"fake");

        let cache = MediaCache::load(index_path.clone(), 1_000_000);
        cache.insert("s1".to_string(), CacheEntryKind::Song, &song_path, 4);

        let reloaded = MediaCache::load(index_path, 1_000_000);
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains("s1"));
    }

    #[test]
    fn eviction_respects_byte_budget() {
        let dir = TempDir::new().unwrap();
        let index_path = dir.path().join("index.json");
        let cache = MediaCache::load(index_path, 10);

        let a = dir.path().join("a.jpg");
        let b = dir.path().join("b.jpg");
        write_file(&a, &vec![0u8; 8]);
        write_file(&b, &vec![0u8; 8]);

        cache.insert("a".to_string(), CacheEntryKind::Artwork, &a, 8);
        cache.insert("b".to_string(), CacheEntryKind::Artwork, &b, 8);

        assert!(cache.total_bytes() <= 10);
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
    }

    #[test]
    fn get_path_removes_entry_whose_backing_file_vanished() {
        let dir = TempDir::new().unwrap();
        let index_path = dir.path().join("index.json");
        let song_path = dir.path().join("song.mp3");
        write_file(&song_path, b"fake");

        let cache = MediaCache::load(index_path, 1_000_000);
        cache.insert("s1".to_string(), CacheEntryKind::Song, &song_path, 4);

        std::fs::remove_file(&song_path).unwrap();
        assert!(cache.get_path("s1").is_none());
        assert!(!cache.contains("s1"));
    }
}
