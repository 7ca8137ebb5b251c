//! Bundled ffmpeg access via `ffmpeg-sidecar`, so transcoding works without a
//! system ffmpeg install.

use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

pub use ffmpeg_sidecar::download::auto_download;

/// Downloads ffmpeg on first run if it isn't already present.
pub fn ensure_ffmpeg() -> Result<()> {
    if !ffmpeg_sidecar::command::ffmpeg_is_installed() {
        tracing::info!("ffmpeg not found, downloading...");
        auto_download().context("failed to download ffmpeg")?;
        tracing::info!("ffmpeg downloaded successfully");
    }
    Ok(())
}

pub fn is_ffmpeg_available() -> bool {
    ffmpeg_sidecar::command::ffmpeg_is_installed()
}

fn ffmpeg_path() -> std::path::PathBuf {
    ffmpeg_sidecar::paths::ffmpeg_path()
}

/// Transcodes `input` to `output` with the given codec and optional bitrate,
/// overwriting any existing file at `output`.
pub fn transcode_audio(input: &Path, output: &Path, codec: &str, bitrate_kbps: Option<u32>) -> Result<()> {
    let mut cmd = Command::new(ffmpeg_path());
    cmd.arg("-i").arg(input).arg("-y").args(["-c:a", codec]);

    if let Some(br) = bitrate_kbps {
        cmd.args(["-b:a", &format!("{br}k")]);
    }

    cmd.arg(output);

    let result = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .context("failed to execute ffmpeg")?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        anyhow::bail!("ffmpeg transcode failed: {stderr}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checking_availability_does_not_panic() {
        let _ = is_ffmpeg_available();
    }
}
