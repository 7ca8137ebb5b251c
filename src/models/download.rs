//! Client-side download queue types (§3 `DownloadTask`, §4.K).

use serde::{Deserialize, Serialize};

pub const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Downloading,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTask {
    pub id: String,
    pub song_id: String,
    pub title: String,
    pub artist: String,
    pub album_id: Option<String>,
    pub album_name: Option<String>,
    pub artwork_url: Option<String>,
    pub download_url: String,
    pub expected_bytes: Option<u64>,
    pub bytes_received: u64,
    pub retry_count: u32,
    pub status: DownloadStatus,
    #[serde(default)]
    pub error: Option<String>,
}

impl DownloadTask {
    pub fn new(
        song_id: String,
        title: String,
        artist: String,
        album_id: Option<String>,
        album_name: Option<String>,
        artwork_url: Option<String>,
        download_url: String,
        expected_bytes: Option<u64>,
    ) -> Self {
        Self {
            id: format!("song_{song_id}"),
            song_id,
            title,
            artist,
            album_id,
            album_name,
            artwork_url,
            download_url,
            expected_bytes,
            bytes_received: 0,
            retry_count: 0,
            status: DownloadStatus::Pending,
            error: None,
        }
    }

    pub fn progress(&self) -> f64 {
        match self.expected_bytes {
            Some(total) if total > 0 => (self.bytes_received as f64 / total as f64).min(1.0),
            _ => {
                if self.status == DownloadStatus::Completed {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    /// §3 invariant: `Completed ⇒ progress = 1.0 ∧ bytes_received = file_size_on_disk`.
    pub fn mark_completed(&mut self, on_disk_size: u64) {
        self.expected_bytes = Some(on_disk_size);
        self.bytes_received = on_disk_size;
        self.status = DownloadStatus::Completed;
        self.error = None;
    }
}

/// Progress stream payload emitted during an active transfer (§4.K).
#[derive(Debug, Clone, Serialize)]
pub struct DownloadProgress {
    pub task_id: String,
    pub fraction: f64,
    pub bytes: u64,
    pub total: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_invariant_holds_after_mark_completed() {
        let mut t = DownloadTask::new(
            "abc".into(),
            "T".into(),
            "A".into(),
            None,
            None,
            None,
            "https://x/y.mp3".into(),
            Some(999),
        );
        t.mark_completed(1234);
        assert_eq!(t.status, DownloadStatus::Completed);
        assert_eq!(t.bytes_received, t.expected_bytes.unwrap());
        assert_eq!(t.progress(), 1.0);
    }

    #[test]
    fn id_is_song_prefixed() {
        let t = DownloadTask::new(
            "abc123".into(),
            "T".into(),
            "A".into(),
            None,
            None,
            None,
            "u".into(),
            None,
        );
        assert_eq!(t.id, "song_abc123");
    }
}
