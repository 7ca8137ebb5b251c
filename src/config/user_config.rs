//! Owner configuration (§6 `config.json`, §10 "Configuration"). A single
//! `UserConfig`, persisted as JSON, loaded once behind a process-wide
//! singleton and guarded for concurrent mutation.

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use super::Paths;

static USER_CONFIG: OnceCell<Arc<RwLock<UserConfig>>> = OnceCell::new();

/// `HARBORWAVE_ROOT_DIR`-style environment override, authoritative over the
/// persisted value on every start (mirrors the teacher's `SWING_ROOT_DIRS`
/// convention).
const ROOT_DIR_ENV: &str = "HARBORWAVE_ROOT_DIR";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserConfig {
    /// Whether first-run setup has completed.
    #[serde(default)]
    pub setup_complete: bool,

    /// Root music folder to scan. `None` means `NotConfigured` (§7).
    #[serde(default)]
    pub music_folder: Option<String>,

    /// Glob-ish substrings; any path containing one is skipped by the scanner.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Minutes between periodic rescans; 0 disables periodic scanning.
    #[serde(default = "default_scan_interval_minutes")]
    pub scan_interval_minutes: u32,

    /// Whether the filesystem watchdog (§4.I glue) is active.
    #[serde(default)]
    pub enable_watchdog: bool,

    /// On-disk transcoding cache budget in bytes (§4.J, default 2 GiB).
    #[serde(default = "default_transcode_budget_bytes")]
    pub transcode_cache_budget_bytes: u64,

    /// Library Manager LRU sizes (§4.H), overridable.
    #[serde(default = "default_artwork_cache_size")]
    pub artwork_cache_size: usize,
    #[serde(default = "default_song_artwork_cache_size")]
    pub song_artwork_cache_size: usize,
    #[serde(default = "default_duration_cache_size")]
    pub duration_cache_size: usize,

    /// Override for the scan-batch worker-pool size (§4.G); `None` means
    /// "derive from detected CPU count".
    #[serde(default)]
    pub scan_batch_size_override: Option<usize>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            setup_complete: false,
            music_folder: None,
            exclude_patterns: Vec::new(),
            scan_interval_minutes: default_scan_interval_minutes(),
            enable_watchdog: true,
            transcode_cache_budget_bytes: default_transcode_budget_bytes(),
            artwork_cache_size: default_artwork_cache_size(),
            song_artwork_cache_size: default_song_artwork_cache_size(),
            duration_cache_size: default_duration_cache_size(),
            scan_batch_size_override: None,
        }
    }
}

impl UserConfig {
    pub fn load() -> Result<Self> {
        let paths = Paths::get()?;
        let config_path = paths.config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path).context("failed to read config.json")?;
            serde_json::from_str(&content).context("failed to parse config.json")?
        } else {
            let config = Self::default();
            config.save()?;
            config
        };

        // Environment override always wins, matching the deployment
        // convention this server follows (§10).
        if let Ok(root) = std::env::var(ROOT_DIR_ENV) {
            if !root.trim().is_empty() {
                config.music_folder = Some(root);
            }
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let paths = Paths::get()?;
        let content = serde_json::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(paths.config_path(), content).context("failed to write config.json")?;
        Ok(())
    }

    pub fn global() -> Arc<RwLock<UserConfig>> {
        USER_CONFIG
            .get_or_init(|| Arc::new(RwLock::new(UserConfig::load().unwrap_or_default())))
            .clone()
    }

    pub fn update<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Self),
    {
        f(self);
        self.save()
    }

    pub fn is_path_excluded(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.exclude_patterns.iter().any(|p| path_str.contains(p.as_str()))
    }
}

fn default_scan_interval_minutes() -> u32 {
    60
}

fn default_transcode_budget_bytes() -> u64 {
    2 * 1024 * 1024 * 1024
}

fn default_artwork_cache_size() -> usize {
    50
}

fn default_song_artwork_cache_size() -> usize {
    100
}

fn default_duration_cache_size() -> usize {
    2000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_numbers() {
        let config = UserConfig::default();
        assert_eq!(config.artwork_cache_size, 50);
        assert_eq!(config.song_artwork_cache_size, 100);
        assert_eq!(config.duration_cache_size, 2000);
        assert_eq!(config.transcode_cache_budget_bytes, 2 * 1024 * 1024 * 1024);
    }

    #[test]
    fn roundtrips_through_json() {
        let config = UserConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: UserConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.scan_interval_minutes, back.scan_interval_minutes);
    }
}
