//! Probing engine backed by ffprobe/ffmpeg.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

use crate::core::config;
use crate::download::engine::{EngineError, MediaProbe, MediaProber};

/// Thumbnail width in pixels, height keeps the aspect ratio
const THUMBNAIL_WIDTH: u32 = 320;

#[derive(Debug, Clone)]
pub struct FfmpegProber {
    ffmpeg: String,
    ffprobe: String,
}

impl FfmpegProber {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    pub fn from_config() -> Self {
        Self::new(config::FFMPEG_BIN.clone(), config::FFPROBE_BIN.clone())
    }
}

#[async_trait]
impl MediaProber for FfmpegProber {
    async fn probe(&self, path: &Path) -> Result<MediaProbe, EngineError> {
        let output = Command::new(&self.ffprobe)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                program: self.ffprobe.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                program: self.ffprobe.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(MediaProbe {
            duration: parse_duration(&String::from_utf8_lossy(&output.stdout)),
        })
    }

    async fn extract_thumbnail(&self, path: &Path, at_secs: f64, out: &Path) -> Result<(), EngineError> {
        let scale = format!("scale={}:-1", THUMBNAIL_WIDTH);
        let output = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-ss"])
            .arg(format!("{:.3}", at_secs.max(0.0)))
            .arg("-i")
            .arg(path)
            .args(["-vf", &scale, "-frames:v", "1"])
            .arg(out)
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                program: self.ffmpeg.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(EngineError::Failed {
                program: self.ffmpeg.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// ffprobe prints `N/A` or nothing when a container has no duration.
fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .and_then(|l| l.parse::<f64>().ok())
        .filter(|d| d.is_finite())
}
