//! Single-use selection tokens.
//!
//! Inline-button payloads are too small to carry a full request, so each
//! offered encoding is parked here under a random token and the button only
//! carries `dl|<token>`. A token can be taken exactly once.

use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Prefix of the callback payload carried by selection buttons
pub const CALLBACK_PREFIX: &str = "dl|";

/// A download waiting for the user to tap its button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub token: String,
    pub format_id: String,
    pub source_url: String,
    pub credential_file_path: Option<PathBuf>,
}

/// Request data supplied by the resolver; the store assigns the token.
#[derive(Debug, Clone)]
pub struct NewSelection {
    pub format_id: String,
    pub source_url: String,
    pub credential_file_path: Option<PathBuf>,
}

#[derive(Debug)]
struct Entry {
    request: DownloadRequest,
    created_at: Instant,
}

/// Token → pending request map shared by the handlers.
#[derive(Debug)]
pub struct SelectionTokenStore {
    entries: DashMap<String, Entry>,
    ttl: Duration,
}

impl SelectionTokenStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Park a selection and return its token (128-bit, lowercase hex).
    pub fn put(&self, selection: NewSelection) -> String {
        self.put_at(selection, Instant::now())
    }

    pub fn put_at(&self, selection: NewSelection, now: Instant) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let request = DownloadRequest {
            token: token.clone(),
            format_id: selection.format_id,
            source_url: selection.source_url,
            credential_file_path: selection.credential_file_path,
        };
        self.entries.insert(
            token.clone(),
            Entry {
                request,
                created_at: now,
            },
        );
        token
    }

    /// Remove and return the request for `token`.
    ///
    /// `None` means the token is unknown, already taken or expired.
    pub fn take(&self, token: &str) -> Option<DownloadRequest> {
        self.take_at(token, Instant::now())
    }

    pub fn take_at(&self, token: &str, now: Instant) -> Option<DownloadRequest> {
        let (_, entry) = self.entries.remove(token)?;
        if now.saturating_duration_since(entry.created_at) > self.ttl {
            log::debug!("Selection token {} expired", short(token));
            return None;
        }
        Some(entry.request)
    }

    /// Drop entries older than the TTL. Returns how many were removed.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.created_at) <= self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Periodically sweep expired tokens for the life of the process.
    pub fn spawn_sweeper(store: Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.sweep_expired(Instant::now());
                if removed > 0 {
                    log::info!("Swept {} expired selection tokens, {} left", removed, store.len());
                }
            }
        })
    }
}

/// Callback payload for a token.
pub fn callback_data(token: &str) -> String {
    format!("{}{}", CALLBACK_PREFIX, token)
}

/// Token carried by a selection callback payload, if it is one.
pub fn parse_callback_data(data: &str) -> Option<&str> {
    data.strip_prefix(CALLBACK_PREFIX).filter(|t| !t.is_empty())
}

/// First eight characters, for log lines.
pub fn short(token: &str) -> &str {
    token.get(..8).unwrap_or(token)
}
