//! Chat transport boundary.
//!
//! The pipeline talks to the chat only through [`ChatTransport`], so it can be
//! driven by a recording fake in tests. [`TeloxideTransport`] is the Bot API
//! implementation.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, InputFile, MessageId};
use teloxide::RequestError;
use thiserror::Error;
use tokio::fs::File as TokioFile;
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::mpsc;

use crate::download::engine::TransferProgress;
use crate::download::metadata::MediaKind;

/// Identity of a message the bot sent and may later edit or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

impl MessageRef {
    pub fn new(chat_id: ChatId, message_id: MessageId) -> Self {
        Self { chat_id, message_id }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("cannot read {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Used by non-Telegram transports
    #[error("{0}")]
    Other(String),
}

/// Media attachment to deliver.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub kind: MediaKind,
    pub path: PathBuf,
    pub thumbnail: Option<PathBuf>,
    pub caption: String,
    /// Whole seconds, 0 when unknown
    pub duration: u32,
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageRef, TransportError>;

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), TransportError>;

    async fn delete(&self, message: MessageRef) -> Result<(), TransportError>;

    /// Upload `media`, posting `(bytes_sent, file_len)` into `progress_tx` as the file is read.
    async fn send_media(
        &self,
        chat_id: ChatId,
        media: MediaUpload,
        progress_tx: mpsc::UnboundedSender<TransferProgress>,
    ) -> Result<(), TransportError>;
}

/// An `AsyncRead` wrapper that reports cumulative bytes read.
pub struct ProgressReader<R> {
    inner: R,
    sent: u64,
    total: u64,
    progress_tx: mpsc::UnboundedSender<TransferProgress>,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, total: u64, progress_tx: mpsc::UnboundedSender<TransferProgress>) -> Self {
        Self {
            inner,
            sent: 0,
            total,
            progress_tx,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let after = buf.filled().len();
            if after > before {
                self.sent += (after - before) as u64;
                let progress = TransferProgress {
                    current: self.sent,
                    total: self.total,
                };
                let _ = self.progress_tx.send(progress);
            }
        }
        poll
    }
}

/// Opens `path` as an `InputFile` whose reads are reported to `progress_tx`.
async fn input_file_with_progress(
    path: &Path,
    progress_tx: mpsc::UnboundedSender<TransferProgress>,
) -> Result<InputFile, TransportError> {
    let to_err = |source| TransportError::File {
        path: path.to_path_buf(),
        source,
    };
    let file = TokioFile::open(path).await.map_err(to_err)?;
    let total = file.metadata().await.map_err(to_err)?.len();
    let mut input_file = InputFile::read(ProgressReader::new(file, total, progress_tx));
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        input_file = input_file.file_name(name.to_string());
    }
    Ok(input_file)
}

/// [`ChatTransport`] over the Telegram Bot API.
#[derive(Clone)]
pub struct TeloxideTransport {
    bot: Bot,
}

impl TeloxideTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn shared(bot: Bot) -> Arc<dyn ChatTransport> {
        Arc::new(Self::new(bot))
    }
}

#[async_trait]
impl ChatTransport for TeloxideTransport {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        keyboard: Option<InlineKeyboardMarkup>,
    ) -> Result<MessageRef, TransportError> {
        let mut request = self.bot.send_message(chat_id, text);
        if let Some(markup) = keyboard {
            request = request.reply_markup(markup);
        }
        let sent = request.await?;
        Ok(MessageRef::new(sent.chat.id, sent.id))
    }

    async fn edit_text(&self, message: MessageRef, text: &str) -> Result<(), TransportError> {
        self.bot
            .edit_message_text(message.chat_id, message.message_id, text)
            .await?;
        Ok(())
    }

    async fn delete(&self, message: MessageRef) -> Result<(), TransportError> {
        self.bot.delete_message(message.chat_id, message.message_id).await?;
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        media: MediaUpload,
        progress_tx: mpsc::UnboundedSender<TransferProgress>,
    ) -> Result<(), TransportError> {
        log::info!("Uploading {:?} {}", media.kind, media.path.display());
        let input_file = input_file_with_progress(&media.path, progress_tx).await?;
        let thumbnail = media.thumbnail.as_ref().map(|p| InputFile::file(p.clone()));

        match media.kind {
            MediaKind::Audio => {
                let mut request = self.bot.send_audio(chat_id, input_file).caption(media.caption);
                if media.duration > 0 {
                    request = request.duration(media.duration);
                }
                if let Some(thumb) = thumbnail {
                    request = request.thumbnail(thumb);
                }
                request.await?;
            }
            MediaKind::Video => {
                let mut request = self
                    .bot
                    .send_video(chat_id, input_file)
                    .caption(media.caption)
                    .supports_streaming(true);
                if media.duration > 0 {
                    request = request.duration(media.duration);
                }
                if let Some(thumb) = thumbnail {
                    request = request.thumbnail(thumb);
                }
                request.await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_progress_reader_reports_cumulative_bytes() {
        let data = vec![7u8; 10_000];
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reader = ProgressReader::new(&data[..], data.len() as u64, tx);

        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        drop(reader);

        let mut last = None;
        while let Some(p) = rx.recv().await {
            assert_eq!(p.total, 10_000);
            last = Some(p.current);
        }
        assert_eq!(out.len(), 10_000);
        assert_eq!(last, Some(10_000));
    }

    #[tokio::test]
    async fn test_missing_file_is_file_error() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = input_file_with_progress(Path::new("/nonexistent/media.mp4"), tx)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::File { .. }));
    }
}
