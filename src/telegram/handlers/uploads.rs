//! Cookies upload: `/cookies <text>` or a document attachment.

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{Document, UserId};

use super::types::HandlerDeps;
use crate::core::error::{AppError, AppResult};

pub const COOKIES_USAGE_TEXT: &str =
    "Send /cookies followed by the contents of your cookies.txt, or attach the file as a document.";
pub const COOKIES_SAVED_TEXT: &str = "Cookies saved ✅ They will be used for your next links.";

/// Largest cookies document accepted, in bytes
const MAX_COOKIES_BYTES: u32 = 1024 * 1024;

/// Save `blob` as the user's cookies and report the outcome in chat.
///
/// Without an identifiable sender nothing is stored and the usage text is sent.
pub async fn store_cookies(
    deps: &HandlerDeps,
    chat_id: ChatId,
    user: Option<UserId>,
    blob: &[u8],
) -> AppResult<()> {
    let Some(user) = user else {
        deps.transport.send_text(chat_id, COOKIES_USAGE_TEXT, None).await?;
        return Ok(());
    };

    match deps.credentials.save_blob(user, blob).await {
        Ok(_) => {
            deps.transport.send_text(chat_id, COOKIES_SAVED_TEXT, None).await?;
        }
        Err(AppError::Validation(_)) => {
            deps.transport.send_text(chat_id, COOKIES_USAGE_TEXT, None).await?;
        }
        Err(e) => {
            log::error!("Failed to store cookies for user {}: {}", user.0, e);
            deps.transport
                .send_text(chat_id, &format!("Error saving cookies: {}", e), None)
                .await?;
        }
    }
    Ok(())
}

/// Fetch an uploaded cookies document from Telegram and store it.
pub async fn store_cookies_document(
    bot: &Bot,
    deps: &HandlerDeps,
    chat_id: ChatId,
    user: Option<UserId>,
    document: &Document,
) -> AppResult<()> {
    let Some(user_id) = user else {
        deps.transport.send_text(chat_id, COOKIES_USAGE_TEXT, None).await?;
        return Ok(());
    };

    if document.file.size > MAX_COOKIES_BYTES {
        deps.transport
            .send_text(chat_id, "This file is too large to be a cookies file.", None)
            .await?;
        return Ok(());
    }

    let file = bot.get_file(document.file.id.clone()).await?;
    let mut blob = Vec::with_capacity(file.size as usize);
    bot.download_file(&file.path, &mut blob)
        .await
        .map_err(|e| AppError::Validation(format!("cookies download failed: {}", e)))?;

    log::info!("Received cookies document ({} bytes) from user {}", blob.len(), user_id.0);
    store_cookies(deps, chat_id, user, &blob).await
}
