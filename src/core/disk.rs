//! Disk space checks for download admission
//!
//! A request is only admitted into the download phase when the volume holding
//! the download folder has at least the configured amount of free space.

use crate::core::error::AppError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source of free-space figures for a volume.
pub trait StorageProbe: Send + Sync {
    /// Free bytes available to this process on the probed volume.
    fn available_bytes(&self) -> Result<u64, AppError>;
}

/// `StorageProbe` backed by `df -k` on the volume holding `path`.
#[derive(Debug, Clone)]
pub struct DfProbe {
    path: PathBuf,
}

impl DfProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl StorageProbe for DfProbe {
    fn available_bytes(&self) -> Result<u64, AppError> {
        available_space(&self.path)
    }
}

/// Free bytes on the volume holding `path`, using the df command
///
/// This is a cross-platform approach that works on Linux and macOS.
pub fn available_space(path: &Path) -> Result<u64, AppError> {
    // df needs an existing path; fall back to the parent for not-yet-created folders
    let check_path = if path.exists() {
        path.to_path_buf()
    } else {
        path.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    };

    let output = std::process::Command::new("df")
        .arg("-k")
        .arg(&check_path)
        .output()?;

    if !output.status.success() {
        return Err(AppError::Validation(format!(
            "df command failed for {}: {}",
            check_path.display(),
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let available_kb = parse_df_output(&String::from_utf8_lossy(&output.stdout))?;
    Ok(available_kb * 1024)
}

/// Parses the available KB column out of `df -k` output.
///
/// df output: Filesystem 1K-blocks Used Available Use% Mounted
/// Long device names wrap onto their own line, so the numeric columns are
/// taken from the last non-header line.
fn parse_df_output(stdout: &str) -> Result<u64, AppError> {
    let data = stdout.lines().skip(1).collect::<Vec<_>>().join(" ");

    // Numeric columns are the first three numbers after the device name
    let numbers: Vec<u64> = data.split_whitespace().filter_map(|p| p.parse::<u64>().ok()).collect();
    if numbers.len() < 3 {
        return Err(AppError::Validation("Unexpected df output format".to_string()));
    }

    Ok(numbers[2])
}

/// Admission check run before every download.
#[derive(Clone)]
pub struct DiskGuard {
    probe: Arc<dyn StorageProbe>,
}

impl DiskGuard {
    pub fn new(probe: Arc<dyn StorageProbe>) -> Self {
        Self { probe }
    }

    /// `true` when the probed volume has at least `min_bytes` free.
    ///
    /// A probe failure counts as "no capacity".
    pub fn has_capacity(&self, min_bytes: u64) -> bool {
        match self.probe.available_bytes() {
            Ok(available) if available >= min_bytes => true,
            Ok(available) => {
                log::error!(
                    "🚨 Insufficient disk space: {:.2} MB available (need {:.2} MB)",
                    available as f64 / (1024.0 * 1024.0),
                    min_bytes as f64 / (1024.0 * 1024.0)
                );
                false
            }
            Err(e) => {
                log::error!("Failed to check disk space, rejecting download: {}", e);
                false
            }
        }
    }
}
