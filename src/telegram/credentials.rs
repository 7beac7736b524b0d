//! Per-user cookie files for extraction requests that need a login.
//!
//! A user binds a cookies file by uploading it; the binding lives in memory
//! for the process lifetime while the file stays on disk. Users without a
//! binding fall back to the process-wide `YTDL_COOKIES_FILE`, if any.

use dashmap::DashMap;
use fs_err::tokio as fs;
use std::path::PathBuf;
use teloxide::types::UserId;

use crate::core::error::{AppError, AppResult};

#[derive(Debug)]
pub struct CredentialStore {
    dir: PathBuf,
    default_file: Option<PathBuf>,
    bindings: DashMap<UserId, PathBuf>,
}

impl CredentialStore {
    pub fn new(dir: impl Into<PathBuf>, default_file: Option<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            default_file,
            bindings: DashMap::new(),
        }
    }

    /// Cookies file to use for `user`: their own upload, else the process default.
    pub fn resolve(&self, user: UserId) -> Option<PathBuf> {
        self.bindings
            .get(&user)
            .map(|path| path.value().clone())
            .or_else(|| self.default_file())
    }

    /// Process-wide cookies file, used for senders that cannot be identified.
    pub fn default_file(&self) -> Option<PathBuf> {
        self.default_file.clone()
    }

    /// Point `user` at an existing file. Replaces any earlier binding.
    pub fn bind(&self, user: UserId, path: PathBuf) {
        self.bindings.insert(user, path);
    }

    /// Write `blob` to `<dir>/<user_id>.txt` and bind it to `user`.
    pub async fn save_blob(&self, user: UserId, blob: &[u8]) -> AppResult<PathBuf> {
        if blob.iter().all(u8::is_ascii_whitespace) {
            return Err(AppError::Validation("cookies file is empty".to_string()));
        }

        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(user);
        fs::write(&path, blob).await?;
        log::info!("Saved cookies for user {} to {}", user.0, path.display());

        self.bind(user, path.clone());
        Ok(path)
    }

    fn path_for(&self, user: UserId) -> PathBuf {
        self.dir.join(format!("{}.txt", user.0))
    }
}
