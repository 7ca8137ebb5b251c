//! Core error kinds (§7), implemented with `thiserror` per the §10 ambient
//! stack. Nothing here is allowed to unwind out of a background worker; every
//! worker entry point returns `Result<_, CoreError>` and the spawn site logs
//! and drops the error (§7, last paragraph).

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no music folder configured")]
    NotConfigured,

    #[error("a scan is already in progress")]
    ScanBusy,

    #[error("failed to extract metadata from {0}")]
    ExtractionFailed(PathBuf),

    #[error("metadata cache at {0} is corrupt, resetting to empty")]
    CacheCorrupt(PathBuf),

    #[error("transcoder unavailable, degrading to original quality")]
    TranscodeUnavailable,

    #[error("download transport error: {0}")]
    DownloadTransportError(String),

    #[error("download failed after {0} retries: {1}")]
    DownloadFailed(u32, String),

    #[error("artifact missing on disk, removing orphaned cache entry for {0}")]
    ArtifactMissing(PathBuf),

    #[error("integrity mismatch for {path}: expected {expected} bytes, found {actual}")]
    IntegrityError {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
