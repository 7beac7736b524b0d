//! Common test utilities
//!
//! Recording fakes for the engines, the chat transport and the disk probe,
//! plus a `TestBed` that wires them into a real `Pipeline` / `HandlerDeps`.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use teloxide::types::{ChatId, InlineKeyboardButtonKind, InlineKeyboardMarkup, MessageId};
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use vidrelay::core::disk::{DiskGuard, StorageProbe};
use vidrelay::core::error::AppError;
use vidrelay::download::engine::{
    DownloadedMedia, EngineError, FetchRequest, MediaExtractor, MediaInfo, MediaProbe, MediaProber, RawFormat,
    TransferProgress,
};
use vidrelay::download::formats::FormatResolver;
use vidrelay::download::pipeline::{Pipeline, PipelineSettings};
use vidrelay::download::progress::ProgressThrottle;
use vidrelay::download::tokens::{DownloadRequest, SelectionTokenStore};
use vidrelay::telegram::credentials::CredentialStore;
use vidrelay::telegram::handlers::HandlerDeps;
use vidrelay::telegram::transport::{ChatTransport, MediaUpload, MessageRef, TransportError};

pub const MB: u64 = 1024 * 1024;
pub const CHAT: ChatId = ChatId(100);

/// Shared, ordered record of interesting events across fakes
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        if let Ok(mut events) = self.0.lock() {
            events.push(event.into());
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }
}

// ============================================================================
// Extraction engine
// ============================================================================

pub struct FakeExtractor {
    log: EventLog,
    info: Mutex<Result<MediaInfo, String>>,
    media: Mutex<DownloadedMedia>,
    download_error: Mutex<Option<String>>,
    payload: usize,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    pub inspect_calls: Mutex<Vec<(String, Option<PathBuf>)>>,
    pub download_calls: Mutex<Vec<FetchRequest>>,
    /// Notified each time a download starts
    pub started: Notify,
}

impl FakeExtractor {
    fn new(log: EventLog) -> Self {
        Self {
            log,
            info: Mutex::new(Ok(MediaInfo::default())),
            media: Mutex::new(DownloadedMedia {
                title: "Fake title".to_string(),
                ext: "mp4".to_string(),
                resolution: Some("1280x720".to_string()),
                height: Some(720),
                duration: Some(30.0),
                filesize: Some(25 * MB),
                ..Default::default()
            }),
            download_error: Mutex::new(None),
            payload: 4096,
            gates: Mutex::new(HashMap::new()),
            inspect_calls: Mutex::new(Vec::new()),
            download_calls: Mutex::new(Vec::new()),
            started: Notify::new(),
        }
    }

    pub fn set_info(&self, info: Result<MediaInfo, String>) {
        *self.info.lock().unwrap() = info;
    }

    pub fn set_media(&self, update: impl FnOnce(&mut DownloadedMedia)) {
        update(&mut self.media.lock().unwrap());
    }

    /// Make downloads fail after writing a partial file
    pub fn fail_downloads(&self, message: &str) {
        *self.download_error.lock().unwrap() = Some(message.to_string());
    }

    /// Block downloads of `format_id` until [`release`](Self::release)
    pub fn hold(&self, format_id: &str) {
        self.gates
            .lock()
            .unwrap()
            .insert(format_id.to_string(), Arc::new(Notify::new()));
    }

    pub fn release(&self, format_id: &str) {
        if let Some(gate) = self.gates.lock().unwrap().get(format_id) {
            gate.notify_one();
        }
    }

    pub fn downloads(&self) -> Vec<FetchRequest> {
        self.download_calls.lock().unwrap().clone()
    }

    pub fn inspections(&self) -> Vec<(String, Option<PathBuf>)> {
        self.inspect_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaExtractor for FakeExtractor {
    async fn inspect(&self, url: &str, credentials: Option<&Path>) -> Result<MediaInfo, EngineError> {
        self.inspect_calls
            .lock()
            .unwrap()
            .push((url.to_string(), credentials.map(Path::to_path_buf)));
        self.info.lock().unwrap().clone().map_err(|message| EngineError::Failed {
            program: "fake-extractor".to_string(),
            message,
        })
    }

    async fn download(
        &self,
        request: &FetchRequest,
        progress_tx: mpsc::UnboundedSender<TransferProgress>,
    ) -> Result<DownloadedMedia, EngineError> {
        self.download_calls.lock().unwrap().push(request.clone());
        self.log.push(format!("download-start:{}", request.format_id));
        self.started.notify_one();

        let gate = self.gates.lock().unwrap().get(&request.format_id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let mut media = self.media.lock().unwrap().clone();
        let path = PathBuf::from(request.output_template.replace("%(ext)s", &media.ext));

        if let Some(message) = self.download_error.lock().unwrap().clone() {
            std::fs::write(format!("{}.part", path.display()), b"partial").unwrap();
            self.log.push(format!("download-end:{}", request.format_id));
            return Err(EngineError::Failed {
                program: "fake-extractor".to_string(),
                message,
            });
        }

        std::fs::write(&path, vec![1u8; self.payload]).unwrap();
        let total = self.payload as u64;
        for step in 1..=4 {
            let _ = progress_tx.send(TransferProgress {
                current: total * step / 4,
                total,
            });
        }
        // Let the pipeline drain progress before the task completes
        tokio::time::sleep(Duration::from_millis(50)).await;

        self.log.push(format!("download-end:{}", request.format_id));
        media.path = path;
        Ok(media)
    }
}

pub fn raw_format(format_id: &str, ext: &str, resolution: Option<&str>, filesize: Option<u64>) -> RawFormat {
    RawFormat {
        format_id: format_id.to_string(),
        ext: ext.to_string(),
        resolution: resolution.map(str::to_string),
        height: None,
        filesize,
        filesize_approx: None,
    }
}

// ============================================================================
// Probing engine
// ============================================================================

#[derive(Debug, Clone)]
pub enum ThumbnailBehavior {
    /// Write these bytes to the output path (empty = zero-size file)
    Write(Vec<u8>),
    /// Report success without writing anything
    Nothing,
    Fail(String),
}

pub struct FakeProber {
    probe: Mutex<Result<Option<f64>, String>>,
    probe_gate: Mutex<Option<Arc<Notify>>>,
    thumbnail: Mutex<ThumbnailBehavior>,
    pub thumbnail_calls: Mutex<Vec<(PathBuf, f64, PathBuf)>>,
    /// Notified when a held probe starts waiting
    pub probing: Notify,
}

impl FakeProber {
    fn new() -> Self {
        Self {
            probe: Mutex::new(Ok(Some(30.0))),
            probe_gate: Mutex::new(None),
            probing: Notify::new(),
            thumbnail: Mutex::new(ThumbnailBehavior::Write(b"\xFF\xD8jpeg".to_vec())),
            thumbnail_calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_probe(&self, result: Result<Option<f64>, String>) {
        *self.probe.lock().unwrap() = result;
    }

    /// Block the next probe call until the returned gate is notified
    pub fn hold_next_probe(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.probe_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn set_thumbnail(&self, behavior: ThumbnailBehavior) {
        *self.thumbnail.lock().unwrap() = behavior;
    }

    pub fn thumbnails(&self) -> Vec<(PathBuf, f64, PathBuf)> {
        self.thumbnail_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaProber for FakeProber {
    async fn probe(&self, _path: &Path) -> Result<MediaProbe, EngineError> {
        let gate = self.probe_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            self.probing.notify_one();
            gate.notified().await;
        }

        self.probe
            .lock()
            .unwrap()
            .clone()
            .map(|duration| MediaProbe { duration })
            .map_err(|message| EngineError::Failed {
                program: "fake-probe".to_string(),
                message,
            })
    }

    async fn extract_thumbnail(&self, path: &Path, at_secs: f64, out: &Path) -> Result<(), EngineError> {
        self.thumbnail_calls
            .lock()
            .unwrap()
            .push((path.to_path_buf(), at_secs, out.to_path_buf()));
        match self.thumbnail.lock().unwrap().clone() {
            ThumbnailBehavior::Write(bytes) => {
                std::fs::write(out, bytes).unwrap();
                Ok(())
            }
            ThumbnailBehavior::Nothing => Ok(()),
            ThumbnailBehavior::Fail(message) => Err(EngineError::Failed {
                program: "fake-ffmpeg".to_string(),
                message,
            }),
        }
    }
}

// ============================================================================
// Chat transport
// ============================================================================

#[derive(Debug, Clone)]
pub enum Call {
    Send {
        chat_id: ChatId,
        message: MessageRef,
        text: String,
        /// `(label, callback data)` per row
        buttons: Vec<Vec<(String, String)>>,
    },
    Edit {
        message: MessageRef,
        text: String,
    },
    Delete(MessageRef),
    Media {
        chat_id: ChatId,
        upload: MediaUpload,
        /// Whether the thumbnail file existed when the upload started
        thumbnail_present: bool,
    },
}

pub struct FakeTransport {
    log: EventLog,
    next_id: AtomicI32,
    upload_error: Mutex<Option<String>>,
    pub calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    fn new(log: EventLog) -> Self {
        Self {
            log,
            next_id: AtomicI32::new(1),
            upload_error: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_uploads(&self, message: &str) {
        *self.upload_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Send { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn edits_of(&self, message: MessageRef) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Edit { message: m, text } if m == message => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn deleted(&self, message: MessageRef) -> bool {
        self.calls()
            .iter()
            .any(|c| matches!(c, Call::Delete(m) if *m == message))
    }

    pub fn uploads(&self) -> Vec<(MediaUpload, bool)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Media {
                    upload,
                    thumbnail_present,
                    ..
                } => Some((upload, thumbnail_present)),
                _ => None,
            })
            .collect()
    }

    /// Buttons of the last message that carried a keyboard
    pub fn last_keyboard(&self) -> Vec<Vec<(String, String)>> {
        self.calls()
            .into_iter()
            .rev()
            .find_map(|c| match c {
                Call::Send { buttons, .. } if !buttons.is_empty() => Some(buttons),
                _ => None,
            })
            .unwrap_or_default()
    }
}

fn keyboard_buttons(keyboard: &InlineKeyboardMarkup) -> Vec<Vec<(String, String)>> {
    keyboard
        .inline_keyboard
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| {
                    let data = match &b.kind {
                        InlineKeyboardButtonKind::CallbackData(data) => data.clone(),
                        other => format!("{:?}", other),
                    };
                    (b.text.clone(), data)
                })
                .collect()
        })
        .collect()
}

#[async_trait]
impl ChatTransport for FakeTransport {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageRef, TransportError> {
        let message = MessageRef::new(chat_id, MessageId(self.next_id.fetch_add(1, Ordering::SeqCst)));
        self.calls.lock().unwrap().push(Call::Send {
            chat_id,
            message,
            text: text.to_string(),
            buttons: keyboard.as_ref().map(keyboard_buttons).unwrap_or_default(),
        });
        Ok(message)
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(Call::Edit {
            message,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete(&self, message: MessageRef) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(Call::Delete(message));
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: MediaUpload,
        progress_tx: mpsc::UnboundedSender<TransferProgress>,
    ) -> Result<(), TransportError> {
        let thumbnail_present = media.thumbnail.as_ref().is_some_and(|p| p.exists());
        let name = media
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.log.push(format!("upload:{}", name));
        self.calls.lock().unwrap().push(Call::Media {
            chat_id,
            upload: media.clone(),
            thumbnail_present,
        });

        let total = std::fs::metadata(&media.path).map(|m| m.len()).unwrap_or(0);
        let _ = progress_tx.send(TransferProgress { current: total / 2, total });
        let _ = progress_tx.send(TransferProgress { current: total, total });
        tokio::time::sleep(Duration::from_millis(20)).await;

        match self.upload_error.lock().unwrap().clone() {
            Some(message) => Err(TransportError::Other(message)),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Disk probe
// ============================================================================

pub struct FakeDisk {
    log: EventLog,
    free: AtomicU64,
    checks: AtomicUsize,
}

impl FakeDisk {
    pub fn set_free(&self, bytes: u64) {
        self.free.store(bytes, Ordering::SeqCst);
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

impl StorageProbe for FakeDisk {
    fn available_bytes(&self) -> Result<u64, AppError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.log.push("admission");
        Ok(self.free.load(Ordering::SeqCst))
    }
}

// ============================================================================
// Test bed
// ============================================================================

pub struct TestBed {
    pub dir: TempDir,
    pub log: EventLog,
    pub extractor: Arc<FakeExtractor>,
    pub prober: Arc<FakeProber>,
    pub transport: Arc<FakeTransport>,
    pub disk: Arc<FakeDisk>,
    pub throttle: Arc<ProgressThrottle<MessageRef>>,
    pub tokens: Arc<SelectionTokenStore>,
    pub credentials: Arc<CredentialStore>,
}

impl TestBed {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("downloads")).unwrap();
        let log = EventLog::default();

        Self {
            extractor: Arc::new(FakeExtractor::new(log.clone())),
            prober: Arc::new(FakeProber::new()),
            transport: Arc::new(FakeTransport::new(log.clone())),
            disk: Arc::new(FakeDisk {
                log: log.clone(),
                free: AtomicU64::new(10 * 1024 * MB),
                checks: AtomicUsize::new(0),
            }),
            throttle: Arc::new(ProgressThrottle::new(Duration::from_secs(10))),
            tokens: Arc::new(SelectionTokenStore::new(Duration::from_secs(3600))),
            credentials: Arc::new(CredentialStore::new(dir.path().join("cookies"), None)),
            log,
            dir,
        }
    }

    pub fn download_dir(&self) -> PathBuf {
        self.dir.path().join("downloads")
    }

    /// Names of the files currently in the download folder
    pub fn leftover_files(&self) -> Vec<String> {
        std::fs::read_dir(self.download_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect()
    }

    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.extractor.clone(),
            self.prober.clone(),
            self.transport.clone(),
            DiskGuard::new(self.disk.clone()),
            Arc::clone(&self.throttle),
            PipelineSettings {
                download_dir: self.download_dir(),
                min_free_bytes: 100 * MB,
            },
        )
    }

    pub fn deps(&self) -> HandlerDeps {
        HandlerDeps::new(
            self.transport.clone(),
            FormatResolver::new(self.extractor.clone()),
            Arc::clone(&self.tokens),
            Arc::clone(&self.credentials),
            self.pipeline(),
        )
    }

    pub fn request(&self, format_id: &str) -> DownloadRequest {
        DownloadRequest {
            token: Uuid::new_v4().simple().to_string(),
            format_id: format_id.to_string(),
            source_url: "https://example.com/watch?v=1".to_string(),
            credential_file_path: None,
        }
    }

    /// Send a status message the way the selection handler does
    pub async fn status_message(&self) -> MessageRef {
        self.transport.send_text(CHAT, "Starting download... ⏳", None).await.unwrap()
    }
}
