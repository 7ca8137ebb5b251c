//! Path management (§6 on-disk layout, §9 "explicit construction over hidden
//! globals"). Resolved once via `directories` and handed to the components
//! that need it, rather than reached for ad hoc from call sites.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;

static PATHS: OnceCell<Arc<Paths>> = OnceCell::new();

/// Config dir (server state) vs app-data dir (client-only state, §6) split,
/// exposed through a small singleton.
#[derive(Debug, Clone)]
pub struct Paths {
    config_dir: PathBuf,
    app_data_dir: PathBuf,
}

impl Paths {
    pub fn init(config_override: Option<PathBuf>) -> Result<Arc<Paths>> {
        let paths = PATHS.get_or_try_init(|| {
            let paths = Self::new(config_override)?;
            Ok::<_, anyhow::Error>(Arc::new(paths))
        })?;
        Ok(Arc::clone(paths))
    }

    pub fn get() -> Result<Arc<Paths>> {
        PATHS.get().map(Arc::clone).context("Paths not initialized")
    }

    fn new(config_override: Option<PathBuf>) -> Result<Self> {
        let (config_dir, app_data_dir) = if let Some(path) = config_override {
            (path.clone(), path.join("app-data"))
        } else if let Some(dirs) = directories::ProjectDirs::from("", "", "harborwave") {
            (dirs.config_dir().to_path_buf(), dirs.data_dir().to_path_buf())
        } else {
            (PathBuf::from("."), PathBuf::from("./app-data"))
        };

        let paths = Self { config_dir, app_data_dir };
        paths.create_directories()?;
        Ok(paths)
    }

    fn create_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(self.transcoded_cache_dir())?;
        std::fs::create_dir_all(self.downloads_dir())?;
        std::fs::create_dir_all(self.media_cache_dir("artwork"))?;
        std::fs::create_dir_all(self.media_cache_dir("songs"))?;
        Ok(())
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn app_data_dir(&self) -> &Path {
        &self.app_data_dir
    }

    /// `<config>/config.json`.
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join("config.json")
    }

    /// `<config>/metadata_cache.json`.
    pub fn metadata_cache_path(&self) -> PathBuf {
        self.config_dir.join("metadata_cache.json")
    }

    /// `<config>/transcoded_cache/`.
    pub fn transcoded_cache_dir(&self) -> PathBuf {
        self.config_dir.join("transcoded_cache")
    }

    /// `<config>/server.log`.
    pub fn server_log_path(&self) -> PathBuf {
        self.config_dir.join("server.log")
    }

    /// `<app-data>/downloads/songs/`.
    pub fn downloads_dir(&self) -> PathBuf {
        self.app_data_dir.join("downloads").join("songs")
    }

    pub fn download_path(&self, song_id: &str) -> PathBuf {
        self.downloads_dir().join(format!("{song_id}.mp3"))
    }

    /// `<app-data>/cache/{artwork,songs}/`.
    pub fn media_cache_dir(&self, kind: &str) -> PathBuf {
        self.app_data_dir.join("cache").join(kind)
    }

    /// `<app-data>/cache/index.json` — the client media cache's entry index
    /// (`client::media_cache::MediaCache`).
    pub fn media_cache_index_path(&self) -> PathBuf {
        self.app_data_dir.join("cache").join("index.json")
    }

    /// `<app-data>/downloads/queue.json` — persisted download queue (§4.K).
    pub fn download_queue_path(&self) -> PathBuf {
        self.app_data_dir.join("downloads").join("queue.json")
    }

    /// `<config>/jwt_secret` — random signing key for paired-device tokens,
    /// generated on first run.
    pub fn jwt_secret_path(&self) -> PathBuf {
        self.config_dir.join("jwt_secret")
    }

    /// `<config>/paired_devices.json` — device pairing records.
    pub fn paired_devices_path(&self) -> PathBuf {
        self.config_dir.join("paired_devices.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_layout_under_override() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::new(Some(temp_dir.path().to_path_buf())).unwrap();

        assert!(paths.config_dir().exists());
        assert!(paths.transcoded_cache_dir().exists());
        assert!(paths.downloads_dir().exists());
        assert!(paths.media_cache_dir("artwork").exists());
    }
}
