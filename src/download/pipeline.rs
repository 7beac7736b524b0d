//! Download → process → upload pipeline for one selected encoding.
//!
//! Stages run strictly in order. Only admission and download are serialized
//! across requests (they compete for disk headroom); probing, thumbnailing and
//! uploading run concurrently. Every exit path edits or deletes the status
//! message and removes the files the request produced.

use fs_err::tokio as fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use strum::Display;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

use crate::core::disk::DiskGuard;
use crate::download::engine::{
    DownloadedMedia, EngineError, FetchRequest, MediaExtractor, MediaProber, TransferProgress,
};
use crate::download::metadata::{
    build_caption, caption_size, resolution_label, select_duration, CaptionInfo, MediaKind,
};
use crate::download::progress::{render_progress, ProgressThrottle, TransferVerb};
use crate::download::tokens::{short, DownloadRequest};
use crate::telegram::transport::{ChatTransport, MediaUpload, MessageRef, TransportError};

pub const UPLOADING_TEXT: &str = "Uploading... ⏳";
pub const BUSY_TEXT: &str = "System busy with downloads. Please wait a moment ⏳.";

/// Process-wide gate around disk admission and download.
#[derive(Debug, Clone, Default)]
pub struct SerializationLock(Arc<Mutex<()>>);

impl SerializationLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Stage {
    Admitted,
    Downloading,
    Probing,
    Uploading,
    Delivered,
    Failed,
    Rejected,
}

/// Terminal failure of one request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    #[error("insufficient free disk space")]
    AdmissionRejected,

    #[error("download failed: {0}")]
    Download(String),

    #[error("processing failed: {0}")]
    Processing(String),

    #[error("upload failed: {0}")]
    Upload(String),
}

impl PipelineError {
    /// Text written into the status message.
    pub fn user_message(&self) -> String {
        match self {
            Self::AdmissionRejected => BUSY_TEXT.to_string(),
            Self::Download(e) => format!("Error during download: {}", e),
            Self::Processing(e) => format!("Error processing media: {}", e),
            Self::Upload(e) => format!("Error during upload: {}", e),
        }
    }

    pub fn terminal_stage(&self) -> Stage {
        match self {
            Self::AdmissionRejected => Stage::Rejected,
            _ => Stage::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub download_dir: PathBuf,
    pub min_free_bytes: u64,
}

/// Files a request may leave behind.
struct RequestArtifacts {
    dir: PathBuf,
    stem: String,
    tracked: Vec<PathBuf>,
}

impl RequestArtifacts {
    fn new(dir: &Path, token: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            stem: token.to_string(),
            tracked: Vec::new(),
        }
    }

    fn track(&mut self, path: PathBuf) {
        self.tracked.push(path);
    }

    /// Best-effort removal of tracked files and any `<token>.*` leftovers
    /// (partial downloads, fragments) in the download folder.
    async fn cleanup(self) {
        for path in &self.tracked {
            remove_quietly(path).await;
        }

        let prefix = format!("{}.", self.stem);
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("Cleanup scan of {} skipped: {}", self.dir.display(), e);
                return;
            }
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                remove_quietly(&entry.path()).await;
            }
        }
    }
}

async fn remove_quietly(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => log::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Cleanup failed: {}", e),
    }
}

fn output_template(dir: &Path, token: &str) -> String {
    dir.join(format!("{}.%(ext)s", token)).display().to_string()
}

/// `<media>.jpg`
fn thumbnail_path(media: &Path) -> PathBuf {
    let mut name = media.as_os_str().to_os_string();
    name.push(".jpg");
    PathBuf::from(name)
}

async fn is_usable_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Drives selected requests to a terminal stage.
#[derive(Clone)]
pub struct Pipeline {
    extractor: Arc<dyn MediaExtractor>,
    prober: Arc<dyn MediaProber>,
    transport: Arc<dyn ChatTransport>,
    guard: DiskGuard,
    lock: SerializationLock,
    throttle: Arc<ProgressThrottle<MessageRef>>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        prober: Arc<dyn MediaProber>,
        transport: Arc<dyn ChatTransport>,
        guard: DiskGuard,
        throttle: Arc<ProgressThrottle<MessageRef>>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            extractor,
            prober,
            transport,
            guard,
            lock: SerializationLock::new(),
            throttle,
            settings,
        }
    }

    /// Run `request`, reporting through `status`. Never fails: errors end up in the status message.
    pub async fn run(&self, status: MessageRef, request: DownloadRequest) -> Stage {
        let tag = short(&request.token).to_string();
        let mut artifacts = RequestArtifacts::new(&self.settings.download_dir, &request.token);

        let stage = match self.execute(&tag, status, &request, &mut artifacts).await {
            Ok(()) => {
                if let Err(e) = self.transport.delete(status).await {
                    log::warn!("[{}] Failed to delete status message: {}", tag, e);
                }
                Stage::Delivered
            }
            Err(err) => {
                log::error!("[{}] {}", tag, err);
                if let Err(e) = self.transport.edit_text(status, &err.user_message()).await {
                    log::warn!("[{}] Failed to report error to chat: {}", tag, e);
                }
                err.terminal_stage()
            }
        };

        artifacts.cleanup().await;
        self.throttle.forget(&status);
        log::info!("[{}] {}", tag, stage);
        stage
    }

    async fn execute(
        &self,
        tag: &str,
        status: MessageRef,
        request: &DownloadRequest,
        artifacts: &mut RequestArtifacts,
    ) -> Result<(), PipelineError> {
        let media = {
            let _admission = self.lock.acquire().await;
            log::info!("[{}] {}", tag, Stage::Admitted);

            if !self.guard.has_capacity(self.settings.min_free_bytes) {
                return Err(PipelineError::AdmissionRejected);
            }

            log::info!("[{}] {} format {} of {}", tag, Stage::Downloading, request.format_id, request.source_url);
            self.download(status, request).await?
        };
        artifacts.track(media.path.clone());

        log::info!("[{}] {} {}", tag, Stage::Probing, media.path.display());
        let upload = self.prepare_upload(tag, &media, artifacts).await?;

        log::info!("[{}] {}", tag, Stage::Uploading);
        if let Err(e) = self.transport.edit_text(status, UPLOADING_TEXT).await {
            log::warn!("[{}] Failed to update status: {}", tag, e);
        }
        self.upload(status, upload).await
    }

    async fn download(&self, status: MessageRef, request: &DownloadRequest) -> Result<DownloadedMedia, PipelineError> {
        let fetch = FetchRequest {
            url: request.source_url.clone(),
            format_id: request.format_id.clone(),
            credentials: request.credential_file_path.clone(),
            output_template: output_template(&self.settings.download_dir, &request.token),
        };

        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let extractor = Arc::clone(&self.extractor);
        let handle = tokio::spawn(async move { extractor.download(&fetch, progress_tx).await });

        self.relay_progress(status, TransferVerb::Downloading, progress_rx, handle)
            .await
            .map_err(|e| PipelineError::Download(e.to_string()))?
            .map_err(|e: EngineError| PipelineError::Download(e.to_string()))
    }

    async fn prepare_upload(
        &self,
        tag: &str,
        media: &DownloadedMedia,
        artifacts: &mut RequestArtifacts,
    ) -> Result<MediaUpload, PipelineError> {
        let probe = self
            .prober
            .probe(&media.path)
            .await
            .map_err(|e| PipelineError::Processing(e.to_string()))?;
        let duration = select_duration(&probe, media);

        let thumb = thumbnail_path(&media.path);
        artifacts.track(thumb.clone());
        let thumbnail = match self.prober.extract_thumbnail(&media.path, duration / 2.0, &thumb).await {
            Ok(()) if is_usable_file(&thumb).await => Some(thumb),
            Ok(()) => {
                log::warn!("[{}] Thumbnail is missing or empty, uploading without one", tag);
                None
            }
            Err(e) => {
                log::warn!("[{}] Thumbnail extraction failed, uploading without one: {}", tag, e);
                None
            }
        };

        let on_disk = fs::metadata(&media.path).await.ok().map(|m| m.len());
        let resolution = resolution_label(media.resolution.as_deref(), media.height);
        let caption = build_caption(&CaptionInfo {
            title: &media.title,
            size_bytes: caption_size(media, on_disk),
            resolution: &resolution,
            duration_secs: duration,
        });

        let ext = if media.ext.is_empty() {
            media
                .path
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            media.ext.clone()
        };

        Ok(MediaUpload {
            kind: MediaKind::classify(&ext),
            path: media.path.clone(),
            thumbnail,
            caption,
            duration: duration as u32,
        })
    }

    async fn upload(&self, status: MessageRef, upload: MediaUpload) -> Result<(), PipelineError> {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let transport = Arc::clone(&self.transport);
        let chat_id = status.chat_id;
        let handle = tokio::spawn(async move { transport.send_media(chat_id, upload, progress_tx).await });

        self.relay_progress(status, TransferVerb::Uploading, progress_rx, handle)
            .await
            .map_err(|e| PipelineError::Upload(e.to_string()))?
            .map_err(|e: TransportError| PipelineError::Upload(e.to_string()))
    }

    /// Forward throttled progress frames into `status` until `handle` finishes.
    async fn relay_progress<T>(
        &self,
        status: MessageRef,
        verb: TransferVerb,
        mut progress_rx: mpsc::UnboundedReceiver<TransferProgress>,
        mut handle: JoinHandle<T>,
    ) -> Result<T, tokio::task::JoinError> {
        loop {
            tokio::select! {
                Some(progress) = progress_rx.recv() => {
                    if self.throttle.should_emit(&status, Instant::now()) {
                        let text = render_progress(verb, progress.current, progress.total);
                        if let Err(e) = self.transport.edit_text(status, &text).await {
                            log::debug!("Progress edit skipped: {}", e);
                        }
                    }
                }
                result = &mut handle => return result,
            }
        }
    }
}
