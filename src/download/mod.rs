//! Download management: format resolution, selection tokens, progress and the
//! download/process/upload pipeline, plus the engine adapters behind them.

pub mod engine;
pub mod ffmpeg;
pub mod formats;
pub mod metadata;
pub mod pipeline;
pub mod progress;
pub mod tokens;
pub mod ytdlp;

// Re-exports for convenience
pub use engine::{EngineError, MediaExtractor, MediaProber, TransferProgress};
pub use ffmpeg::FfmpegProber;
pub use formats::{EncodingDescriptor, FormatResolver, ResolutionError, ResolvedMedia};
pub use pipeline::{Pipeline, PipelineError, PipelineSettings, SerializationLock, Stage};
pub use progress::ProgressThrottle;
pub use tokens::{DownloadRequest, SelectionTokenStore};
pub use ytdlp::YtDlpExtractor;
