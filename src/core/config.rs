//! Configuration for the bot.
//!
//! Every value is read once from the environment on first access. `.env` is
//! loaded by `main` before anything here is touched.

use once_cell::sync::Lazy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_default()
});

/// Custom Bot API server URL (local telegram-bot-api), if any
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| non_empty_var("BOT_API_URL"));

/// yt-dlp binary, defaults to "yt-dlp" on PATH
pub static YTDL_BIN: Lazy<String> = Lazy::new(|| env::var("YTDL_BIN").unwrap_or_else(|_| "yt-dlp".to_string()));

/// ffmpeg binary, defaults to "ffmpeg" on PATH
pub static FFMPEG_BIN: Lazy<String> = Lazy::new(|| env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".to_string()));

/// ffprobe binary, defaults to "ffprobe" on PATH
pub static FFPROBE_BIN: Lazy<String> =
    Lazy::new(|| env::var("FFPROBE_BIN").unwrap_or_else(|_| "ffprobe".to_string()));

/// Process-wide default cookies file, used when a user has not uploaded their own.
/// Read from YTDL_COOKIES_FILE environment variable
pub static YTDL_COOKIES_FILE: Lazy<Option<String>> = Lazy::new(|| non_empty_var("YTDL_COOKIES_FILE"));

/// Download folder path
/// Read from DOWNLOAD_FOLDER environment variable, supports tilde (~) expansion
pub static DOWNLOAD_FOLDER: Lazy<String> =
    Lazy::new(|| env::var("DOWNLOAD_FOLDER").unwrap_or_else(|_| "downloads".to_string()));

/// Directory where per-user cookies uploads are written
pub static COOKIES_DIR: Lazy<String> = Lazy::new(|| env::var("COOKIES_DIR").unwrap_or_else(|_| "cookies".to_string()));

/// Log file path
/// Default: vidrelay.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "vidrelay.log".to_string()));

/// Log level name (error, warn, info, debug, trace)
pub static LOG_LEVEL: Lazy<String> = Lazy::new(|| env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()));

/// Resolved download directory with `~` expanded.
pub fn download_dir() -> PathBuf {
    expand_path(&DOWNLOAD_FOLDER)
}

/// Resolved cookies directory with `~` expanded.
pub fn cookies_dir() -> PathBuf {
    expand_path(&COOKIES_DIR)
}

/// Resolved process-wide default cookies file, if configured.
pub fn default_cookies_file() -> Option<PathBuf> {
    YTDL_COOKIES_FILE.as_deref().map(expand_path)
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Disk admission configuration
pub mod admission {
    use once_cell::sync::Lazy;

    /// Default minimum free space on the download volume (100 MB)
    pub const DEFAULT_MIN_FREE_MB: u64 = 100;

    /// Minimum free space in MB before a download is admitted.
    /// Read from MIN_FREE_DISK_MB environment variable
    pub static MIN_FREE_DISK_MB: Lazy<u64> = Lazy::new(|| {
        std::env::var("MIN_FREE_DISK_MB")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MIN_FREE_MB)
    });

    /// Minimum free space in bytes
    pub fn min_free_bytes() -> u64 {
        *MIN_FREE_DISK_MB * 1024 * 1024
    }
}

/// Liveness endpoint configuration
pub mod health {
    use once_cell::sync::Lazy;

    /// Port for the liveness listener (default 8080)
    pub static PORT: Lazy<u16> = Lazy::new(|| {
        std::env::var("HEALTH_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080)
    });
}

/// Progress reporting configuration
pub mod progress {
    use super::Duration;

    /// Minimum time between two non-terminal edits of one status message (seconds)
    pub const THROTTLE_WINDOW_SECS: u64 = 10;

    /// Idle throttle entries older than this are swept (seconds)
    pub const STATE_TTL_SECS: u64 = 3600;

    /// Number of segments in the progress bar
    pub const BAR_SEGMENTS: usize = 10;

    pub fn throttle_window() -> Duration {
        Duration::from_secs(THROTTLE_WINDOW_SECS)
    }

    pub fn state_ttl() -> Duration {
        Duration::from_secs(STATE_TTL_SECS)
    }
}

/// Format selection configuration
pub mod selection {
    use super::Duration;

    /// Maximum number of encodings offered as buttons
    pub const MAX_ENCODINGS: usize = 10;

    /// Buttons per keyboard row
    pub const BUTTONS_PER_ROW: usize = 2;

    /// Unselected tokens older than this are swept (seconds)
    pub const TOKEN_TTL_SECS: u64 = 3600;

    /// Interval between store sweeps (seconds)
    pub const SWEEP_INTERVAL_SECS: u64 = 300;

    pub fn token_ttl() -> Duration {
        Duration::from_secs(TOKEN_TTL_SECS)
    }

    pub fn sweep_interval() -> Duration {
        Duration::from_secs(SWEEP_INTERVAL_SECS)
    }
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API calls (in seconds)
    /// Large video uploads go through the same client, so this is generous.
    pub const REQUEST_TIMEOUT_SECS: u64 = 900;

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}
