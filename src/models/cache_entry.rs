//! Client media cache entry (§3 `CacheEntry`). Tracks one artwork or song
//! file the client has cached locally, so the LRU eviction in
//! `client::media_cache` has something to sort and budget against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheEntryKind {
    Artwork,
    Song,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: String,
    pub kind: CacheEntryKind,
    pub path: String,
    pub size_bytes: u64,
    pub last_accessed: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(id: String, kind: CacheEntryKind, path: String, size_bytes: u64) -> Self {
        Self {
            id,
            kind,
            path,
            size_bytes,
            last_accessed: Utc::now(),
        }
    }

    /// §3 invariant: if an entry is present, its backing file exists.
    /// Violated entries are orphans, removed silently at startup (§7
    /// `ArtifactMissing`).
    pub fn backing_file_exists(&self) -> bool {
        std::path::Path::new(&self.path).is_file()
    }
}
