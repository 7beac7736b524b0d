//! Media metadata derivation for delivery: attachment kind, duration, caption.

use crate::download::engine::{DownloadedMedia, MediaProbe};
use crate::download::formats::size_display;

/// Container extensions delivered as audio attachments
pub const AUDIO_EXTENSIONS: [&str; 8] = ["mp3", "m4a", "webm", "opus", "ogg", "flac", "wav", "aac"];

/// Attachment kind used by the upload stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// Audio for extensions in [`AUDIO_EXTENSIONS`], video otherwise.
    pub fn classify(ext: &str) -> Self {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Audio
        } else {
            MediaKind::Video
        }
    }
}

/// Probe duration if positive, else the extraction engine's duration if positive, else 0.
pub fn select_duration(probe: &MediaProbe, media: &DownloadedMedia) -> f64 {
    [probe.duration, media.duration]
        .into_iter()
        .flatten()
        .find(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0)
}

/// `H:MM:SS` with unpadded hours; fractional seconds are dropped.
pub fn format_hms(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// `1280x720`, then `720p`, then `audio`.
pub fn resolution_label(resolution: Option<&str>, height: Option<u32>) -> String {
    match (resolution.map(str::trim).filter(|r| !r.is_empty()), height) {
        (Some(r), _) => r.to_string(),
        (None, Some(h)) if h > 0 => format!("{}p", h),
        _ => "audio".to_string(),
    }
}

fn small_cap(c: char) -> char {
    match c.to_ascii_lowercase() {
        'a' => 'ᴀ',
        'b' => 'ʙ',
        'c' => 'ᴄ',
        'd' => 'ᴅ',
        'e' => 'ᴇ',
        'f' => 'ꜰ',
        'g' => 'ɢ',
        'h' => 'ʜ',
        'i' => 'ɪ',
        'j' => 'ᴊ',
        'k' => 'ᴋ',
        'l' => 'ʟ',
        'm' => 'ᴍ',
        'n' => 'ɴ',
        'o' => 'ᴏ',
        'p' => 'ᴘ',
        'q' => 'ǫ',
        'r' => 'ʀ',
        't' => 'ᴛ',
        'u' => 'ᴜ',
        'w' => 'ᴡ',
        'y' => 'ʏ',
        'z' => 'ᴢ',
        // s, v and x have no usable small capital
        lower if lower.is_ascii_lowercase() => lower,
        _ => c,
    }
}

pub fn to_small_caps(text: &str) -> String {
    text.chars().map(small_cap).collect()
}

/// Caption fields resolved by the pipeline.
#[derive(Debug, Clone)]
pub struct CaptionInfo<'a> {
    pub title: &'a str,
    pub size_bytes: u64,
    pub resolution: &'a str,
    pub duration_secs: f64,
}

/// Title line followed by the quoted size/quality/duration line.
pub fn build_caption(info: &CaptionInfo<'_>) -> String {
    let title = if info.title.trim().is_empty() {
        "No Title"
    } else {
        info.title
    };
    format!(
        "{}\n> {}: {} | {}: {} | {}: {}",
        title,
        to_small_caps("size"),
        size_display(info.size_bytes),
        to_small_caps("quality"),
        info.resolution,
        to_small_caps("duration"),
        format_hms(info.duration_secs)
    )
}

/// Size for the caption: engine size, then approximate size, then `on_disk`.
pub fn caption_size(media: &DownloadedMedia, on_disk: Option<u64>) -> u64 {
    media
        .filesize
        .or(media.filesize_approx)
        .or(on_disk)
        .unwrap_or(0)
}
