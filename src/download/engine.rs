//! Interfaces to the external media engines.
//!
//! The extraction engine inspects URLs and performs transfers; the probing
//! engine reports durations and grabs still frames. Both are process-backed in
//! production (`ytdlp`, `ffmpeg`) and faked in tests.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

/// Failures reported by an engine process.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine binary could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine ran and reported failure; `message` is its stderr text
    #[error("{message}")]
    Failed { program: String, message: String },

    /// The engine succeeded but its output could not be understood
    #[error("unexpected engine output: {0}")]
    Output(String),

    /// The worker running the engine died
    #[error("engine task failed: {0}")]
    Task(String),
}

/// Byte counts posted while a transfer is running.
///
/// `total` is 0 when the size is not known yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub current: u64,
    pub total: u64,
}

/// One encoding as reported by the extraction engine.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    pub format_id: String,
    #[serde(default)]
    pub ext: String,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default, deserialize_with = "lenient_size")]
    pub filesize: Option<u64>,
    #[serde(default, deserialize_with = "lenient_size")]
    pub filesize_approx: Option<u64>,
}

/// Inspection result for a URL. Formats keep the engine's order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
    #[serde(default)]
    pub duration: Option<f64>,
}

// yt-dlp occasionally reports approximate sizes as floats
fn lenient_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|v| v.is_finite() && *v > 0.0).map(|v| v as u64))
}

/// Parameters for a single transfer.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub format_id: String,
    pub credentials: Option<PathBuf>,
    /// Engine output template, e.g. `downloads/<token>.%(ext)s`
    pub output_template: String,
}

/// What the extraction engine reports after a finished transfer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadedMedia {
    #[serde(rename = "filepath")]
    pub path: PathBuf,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub ext: String,
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "lenient_size")]
    pub filesize: Option<u64>,
    #[serde(default, deserialize_with = "lenient_size")]
    pub filesize_approx: Option<u64>,
}

/// Probe result from the transcoding engine.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MediaProbe {
    pub duration: Option<f64>,
}

/// URL inspection and transfer.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Inspect `url` without downloading anything.
    async fn inspect(&self, url: &str, credentials: Option<&Path>) -> Result<MediaInfo, EngineError>;

    /// Run the transfer, posting byte counts into `progress_tx`.
    async fn download(
        &self,
        request: &FetchRequest,
        progress_tx: mpsc::UnboundedSender<TransferProgress>,
    ) -> Result<DownloadedMedia, EngineError>;
}

/// Duration probing and still-frame extraction.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaProbe, EngineError>;

    /// Write one frame taken at `at_secs` to `out`.
    async fn extract_thumbnail(&self, path: &Path, at_secs: f64, out: &Path) -> Result<(), EngineError>;
}
