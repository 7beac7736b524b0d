//! Extraction engine backed by the yt-dlp executable.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::core::config;
use crate::download::engine::{DownloadedMedia, EngineError, FetchRequest, MediaExtractor, MediaInfo, TransferProgress};

const PROGRESS_PREFIX: &str = "[progress] ";
const RESULT_PREFIX: &str = "[result] ";
const PROGRESS_TEMPLATE: &str =
    "download:[progress] %(progress.downloaded_bytes)s/%(progress.total_bytes)s/%(progress.total_bytes_estimate)s";
const RESULT_TEMPLATE: &str = "after_move:[result] %()j";

/// Number of stderr lines kept for error reporting
const STDERR_TAIL: usize = 50;

/// `MediaExtractor` that shells out to yt-dlp.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    bin: String,
}

impl YtDlpExtractor {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Extractor using the configured `YTDL_BIN`.
    pub fn from_config() -> Self {
        Self::new(config::YTDL_BIN.clone())
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn inspect(&self, url: &str, credentials: Option<&Path>) -> Result<MediaInfo, EngineError> {
        let args = inspect_args(url, credentials);
        log::debug!("{} {}", self.bin, args.join(" "));

        let output = tokio::process::Command::new(&self.bin)
            .args(&args)
            .output()
            .await
            .map_err(|source| EngineError::Spawn {
                program: self.bin.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Failed {
                program: self.bin.clone(),
                message: error_summary(stderr.lines()),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| EngineError::Output(format!("yt-dlp -J: {}", e)))
    }

    async fn download(
        &self,
        request: &FetchRequest,
        progress_tx: mpsc::UnboundedSender<TransferProgress>,
    ) -> Result<DownloadedMedia, EngineError> {
        let bin = self.bin.clone();
        let args = download_args(request);
        log::debug!("{} {}", bin, args.join(" "));

        tokio::task::spawn_blocking(move || run_download(&bin, &args, &progress_tx))
            .await
            .map_err(|e| EngineError::Task(format!("Task join error: {}", e)))?
    }
}

fn inspect_args(url: &str, credentials: Option<&Path>) -> Vec<String> {
    let mut args: Vec<String> = ["-J", "--skip-download", "--no-warnings", "--no-playlist"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    push_cookies(&mut args, credentials);
    args.push(url.to_string());
    args
}

fn download_args(request: &FetchRequest) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-f".into(),
        request.format_id.clone(),
        "-o".into(),
        request.output_template.clone(),
        "--no-playlist".into(),
        "--no-warnings".into(),
        "--newline".into(),
        "--progress".into(),
        "--progress-template".into(),
        PROGRESS_TEMPLATE.into(),
        "--print".into(),
        RESULT_TEMPLATE.into(),
    ];
    push_cookies(&mut args, request.credentials.as_deref());
    args.push(request.url.clone());
    args
}

fn push_cookies(args: &mut Vec<String>, credentials: Option<&Path>) {
    if let Some(path) = credentials {
        args.push("--cookies".into());
        args.push(path.display().to_string());
    }
}

/// Runs a yt-dlp download to completion on the current (blocking) thread.
fn run_download(
    bin: &str,
    args: &[String],
    progress_tx: &mpsc::UnboundedSender<TransferProgress>,
) -> Result<DownloadedMedia, EngineError> {
    let mut child = Command::new(bin)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| EngineError::Spawn {
            program: bin.to_string(),
            source,
        })?;

    let stderr_lines = Arc::new(Mutex::new(VecDeque::<String>::new()));

    // Read stderr in a separate thread
    let stderr_reader = child.stderr.take().map(|stream| {
        let lines = Arc::clone(&stderr_lines);
        std::thread::spawn(move || {
            for line in BufReader::new(stream).lines().map_while(Result::ok) {
                log::debug!("yt-dlp stderr: {}", line);
                if let Ok(mut tail) = lines.lock() {
                    tail.push_back(line);
                    if tail.len() > STDERR_TAIL {
                        tail.pop_front();
                    }
                }
            }
        })
    });

    let mut result: Option<DownloadedMedia> = None;
    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines().map_while(Result::ok) {
            if let Some(progress) = parse_progress_line(&line) {
                // Receiver gone means the pipeline stopped listening; keep draining stdout
                let _ = progress_tx.send(progress);
            } else if let Some(json) = line.strip_prefix(RESULT_PREFIX) {
                match serde_json::from_str::<DownloadedMedia>(json) {
                    Ok(media) => result = Some(media),
                    Err(e) => log::warn!("Unparseable yt-dlp result line: {}", e),
                }
            } else {
                log::debug!("yt-dlp stdout: {}", line);
            }
        }
    }

    let status = child.wait().map_err(|e| EngineError::Task(format!("yt-dlp wait failed: {}", e)))?;
    if let Some(handle) = stderr_reader {
        let _ = handle.join();
    }

    if !status.success() {
        let tail: Vec<String> = stderr_lines
            .lock()
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default();
        return Err(EngineError::Failed {
            program: bin.to_string(),
            message: error_summary(tail.iter().map(String::as_str)),
        });
    }

    result.ok_or_else(|| EngineError::Output("yt-dlp finished without reporting the output file".to_string()))
}

/// Parses a `[progress] downloaded/total/estimate` line. yt-dlp prints `NA` for unknown fields.
pub fn parse_progress_line(line: &str) -> Option<TransferProgress> {
    let body = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = body.split('/').map(parse_bytes);
    let current = fields.next()??;
    let total = fields.next().flatten();
    let estimate = fields.next().flatten();
    Some(TransferProgress {
        current,
        total: total.or(estimate).unwrap_or(0),
    })
}

fn parse_bytes(field: &str) -> Option<u64> {
    let value: f64 = field.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value as u64)
}

/// Picks the `ERROR:` lines from yt-dlp stderr, or the last line when there are none.
fn error_summary<'a>(lines: impl Iterator<Item = &'a str>) -> String {
    let lines: Vec<&str> = lines.map(str::trim).filter(|l| !l.is_empty()).collect();
    let errors: Vec<&str> = lines.iter().copied().filter(|l| l.starts_with("ERROR")).collect();
    if !errors.is_empty() {
        errors.join("\n")
    } else {
        lines
            .last()
            .map(|l| l.to_string())
            .unwrap_or_else(|| "yt-dlp failed without output".to_string())
    }
}
