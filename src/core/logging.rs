//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Configuration summary at startup
//! - External tool availability check (yt-dlp, ffmpeg)

use anyhow::Result;
use simplelog::*;
use std::fs::File;
use std::str::FromStr;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
/// * `level` - Level name; unknown names fall back to `info`
pub fn init_logger(log_file_path: &str, level: &str) -> Result<()> {
    let level = LevelFilter::from_str(level).unwrap_or(LevelFilter::Info);
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    let log_config = ConfigBuilder::new()
        .add_filter_ignore_str("hyper")
        .add_filter_ignore_str("reqwest")
        .build();

    CombinedLogger::init(vec![
        TermLogger::new(level, log_config.clone(), TerminalMode::Mixed, ColorChoice::Auto),
        WriteLogger::new(level, log_config, log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective configuration at application startup
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("⚙️  Configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("📁 Download folder: {}", config::download_dir().display());
    log::info!("🍪 Cookies folder: {}", config::cookies_dir().display());
    log::info!("💾 Admission threshold: {} MB free", *config::admission::MIN_FREE_DISK_MB);
    log::info!("❤️  Liveness port: {}", *config::health::PORT);

    match config::default_cookies_file() {
        Some(path) if path.exists() => {
            log::info!("✅ YTDL_COOKIES_FILE: {}", path.display());
        }
        Some(path) => {
            log::error!("❌ YTDL_COOKIES_FILE: {} (FILE NOT FOUND!)", path.display());
            log::error!("   Current directory: {:?}", std::env::current_dir());
        }
        None => {
            log::warn!("⚠️  YTDL_COOKIES_FILE: not set, only per-user cookies will be used");
        }
    }
}

/// Probes yt-dlp and ffmpeg once at startup. Missing tools are logged, not fatal.
pub async fn check_external_tools() {
    check_tool(&config::YTDL_BIN, "--version").await;
    check_tool(&config::FFMPEG_BIN, "-version").await;
    check_tool(&config::FFPROBE_BIN, "-version").await;
}

async fn check_tool(bin: &str, version_flag: &str) {
    match tokio::process::Command::new(bin).arg(version_flag).output().await {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let first = stdout.lines().next().unwrap_or_default();
            log::info!("✅ {}: {}", bin, first.trim());
        }
        Ok(output) => {
            log::error!("❌ {} exited with {}", bin, output.status);
        }
        Err(e) => {
            log::error!("❌ {} not available: {}", bin, e);
        }
    }
}
