//! Format resolution: URL → ordered list of selectable encodings.

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::core::config::selection::MAX_ENCODINGS;
use crate::download::engine::{MediaExtractor, RawFormat};
use crate::download::metadata::resolution_label;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Shown when the engine reports no title
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// Markers that identify an engine failure as an authentication problem
const AUTH_MARKERS: [&str; 2] = ["login", "authorization"];

/// One selectable encoding of a resolved media item.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodingDescriptor {
    pub format_id: String,
    pub container_extension: String,
    /// Human resolution such as `1280x720` or `720p`, `audio` for audio-only
    pub resolution_label: String,
    /// 0 when the engine reported no size
    pub size_bytes: u64,
    pub size_mb_display: String,
}

impl EncodingDescriptor {
    fn from_raw(raw: &RawFormat) -> Self {
        let size_bytes = raw.filesize.or(raw.filesize_approx).unwrap_or(0);
        Self {
            format_id: raw.format_id.clone(),
            container_extension: raw.ext.clone(),
            resolution_label: resolution_label(raw.resolution.as_deref(), raw.height),
            size_bytes,
            size_mb_display: size_display(size_bytes),
        }
    }

    /// Button text: `mp4 | 1280x720 | 12.34 MB`
    pub fn button_label(&self) -> String {
        format!(
            "{} | {} | {}",
            self.container_extension, self.resolution_label, self.size_mb_display
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMedia {
    pub title: String,
    pub encodings: Vec<EncodingDescriptor>,
}

/// Resolution failure, split by the guidance the user needs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("authentication required: {0}")]
    AuthRequired(String),

    #[error("{0}")]
    Generic(String),
}

impl ResolutionError {
    pub fn user_message(&self) -> String {
        match self {
            Self::AuthRequired(_) => {
                "This URL requires login or authorization. Upload a cookies file with /cookies and try again."
                    .to_string()
            }
            Self::Generic(message) => format!("Error: {}", message),
        }
    }
}

/// Put an engine failure text into the auth or generic bucket.
pub fn classify_failure(message: &str) -> ResolutionError {
    let lower = message.to_lowercase();
    if AUTH_MARKERS.iter().any(|marker| lower.contains(marker)) {
        ResolutionError::AuthRequired(message.to_string())
    } else {
        ResolutionError::Generic(message.to_string())
    }
}

/// `12.34 MB` or `Unknown` for a zero size.
pub fn size_display(size_bytes: u64) -> String {
    if size_bytes == 0 {
        "Unknown".to_string()
    } else {
        format!("{:.2} MB", size_bytes as f64 / BYTES_PER_MB)
    }
}

/// Inspection-only front end to the extraction engine.
#[derive(Clone)]
pub struct FormatResolver {
    extractor: Arc<dyn MediaExtractor>,
}

impl FormatResolver {
    pub fn new(extractor: Arc<dyn MediaExtractor>) -> Self {
        Self { extractor }
    }

    /// Resolve `url` into at most `MAX_ENCODINGS` encodings in engine order.
    pub async fn resolve(&self, url: &str, credentials: Option<&Path>) -> Result<ResolvedMedia, ResolutionError> {
        let info = self.extractor.inspect(url, credentials).await.map_err(|e| {
            log::warn!("Format resolution failed for {}: {}", url, e);
            classify_failure(&e.to_string())
        })?;

        let encodings: Vec<EncodingDescriptor> = info
            .formats
            .iter()
            .take(MAX_ENCODINGS)
            .map(EncodingDescriptor::from_raw)
            .collect();

        log::info!(
            "Resolved {} ({} of {} formats offered): {}",
            url,
            encodings.len(),
            info.formats.len(),
            info.title
        );

        let title = if info.title.trim().is_empty() {
            UNKNOWN_TITLE.to_string()
        } else {
            info.title
        };

        Ok(ResolvedMedia { title, encodings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_classify_auth_markers() {
        assert!(matches!(
            classify_failure("ERROR: This video requires LOGIN"),
            ResolutionError::AuthRequired(_)
        ));
        assert!(matches!(
            classify_failure("HTTP Error 401: Authorization required"),
            ResolutionError::AuthRequired(_)
        ));
        assert!(matches!(
            classify_failure("ERROR: Unsupported URL"),
            ResolutionError::Generic(_)
        ));
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(
            ResolutionError::Generic("Unsupported URL".into()).user_message(),
            "Error: Unsupported URL"
        );
        assert!(ResolutionError::AuthRequired("x".into())
            .user_message()
            .contains("/cookies"));
    }

    #[test]
    fn test_size_display() {
        assert_eq!(size_display(0), "Unknown");
        assert_eq!(size_display(10 * 1024 * 1024), "10.00 MB");
        assert_eq!(size_display(1_500_000), "1.43 MB");
    }

    #[test]
    fn test_descriptor_from_raw() {
        let raw = RawFormat {
            format_id: "140".into(),
            ext: "m4a".into(),
            resolution: None,
            height: None,
            filesize: None,
            filesize_approx: Some(2 * 1024 * 1024),
        };
        let d = EncodingDescriptor::from_raw(&raw);
        assert_eq!(d.resolution_label, "audio");
        assert_eq!(d.size_bytes, 2 * 1024 * 1024);
        assert_eq!(d.button_label(), "m4a | audio | 2.00 MB");
    }
}
