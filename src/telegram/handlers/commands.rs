//! Command and callback logic, independent of the dispatcher.

use indoc::indoc;
use teloxide::types::{ChatId, UserId};
use tokio::task::JoinHandle;
use url::Url;

use super::types::HandlerDeps;
use crate::download::formats::ResolvedMedia;
use crate::download::pipeline::Stage;
use crate::download::tokens::{parse_callback_data, short, NewSelection};
use crate::telegram::keyboard::selection_keyboard;
use crate::telegram::transport::TransportError;

pub const WELCOME_TEXT: &str = indoc! {"
    Welcome! 🤖
    Send me a link to a video or track from any supported site and pick a format.
    Progress is shown while the file downloads and uploads, and the media arrives with a thumbnail and details.

    If a site needs you to be logged in, send /cookies with your cookies.txt attached or pasted after the command."
};

pub const INVALID_URL_TEXT: &str = "Please provide a valid URL.";
pub const NO_FORMATS_TEXT: &str = "No downloadable formats found for this URL.";
pub const STARTING_TEXT: &str = "Starting download... ⏳";
pub const STARTED_ANSWER: &str = "Download started.";
pub const EXPIRED_ANSWER: &str = "This selection has expired or is invalid.";

/// The text as an http(s) URL, if it is one.
pub fn parse_media_url(text: &str) -> Option<Url> {
    let text = text.trim();
    if !(text.starts_with("http://") || text.starts_with("https://")) {
        return None;
    }
    Url::parse(text).ok().filter(|url| url.host_str().is_some())
}

/// /start and /help
pub async fn handle_start(deps: &HandlerDeps, chat_id: ChatId) -> Result<(), TransportError> {
    deps.transport.send_text(chat_id, WELCOME_TEXT, None).await?;
    Ok(())
}

/// Resolve a submitted URL and offer its encodings as buttons.
///
/// `user` is `None` for messages without a sender (channel posts); those only
/// get the process-wide cookies file.
pub async fn handle_url(
    deps: &HandlerDeps,
    chat_id: ChatId,
    user: Option<UserId>,
    text: &str,
) -> Result<(), TransportError> {
    let Some(url) = parse_media_url(text) else {
        deps.transport.send_text(chat_id, INVALID_URL_TEXT, None).await?;
        return Ok(());
    };

    let credentials = match user {
        Some(user) => deps.credentials.resolve(user),
        None => deps.credentials.default_file(),
    };
    log::info!("Resolving {} for chat {}", url, chat_id);

    match deps.resolver.resolve(url.as_str(), credentials.as_deref()).await {
        Ok(resolved) if resolved.encodings.is_empty() => {
            deps.transport.send_text(chat_id, NO_FORMATS_TEXT, None).await?;
        }
        Ok(resolved) => {
            let options = park_selections(deps, &resolved, url.as_str(), credentials);
            let text = format!("Select format for {}:", resolved.title);
            deps.transport
                .send_text(chat_id, &text, Some(selection_keyboard(&options)))
                .await?;
        }
        Err(e) => {
            deps.transport.send_text(chat_id, &e.user_message(), None).await?;
        }
    }
    Ok(())
}

/// Store one token per encoding and pair it with its button label.
fn park_selections(
    deps: &HandlerDeps,
    resolved: &ResolvedMedia,
    source_url: &str,
    credentials: Option<std::path::PathBuf>,
) -> Vec<(String, String)> {
    resolved
        .encodings
        .iter()
        .map(|encoding| {
            let token = deps.tokens.put(NewSelection {
                format_id: encoding.format_id.clone(),
                source_url: source_url.to_string(),
                credential_file_path: credentials.clone(),
            });
            (encoding.button_label(), token)
        })
        .collect()
}

/// Result of a selection button tap.
#[derive(Debug)]
pub enum SelectionOutcome {
    /// The pipeline is running for the selected request
    Started(JoinHandle<Stage>),
    /// Unknown, expired or already used token
    Expired,
}

impl SelectionOutcome {
    /// Text for the callback query answer.
    pub fn answer_text(&self) -> &'static str {
        match self {
            Self::Started(_) => STARTED_ANSWER,
            Self::Expired => EXPIRED_ANSWER,
        }
    }
}

/// Consume the token behind a selection button and start its pipeline.
pub async fn handle_selection(
    deps: &HandlerDeps,
    chat_id: ChatId,
    data: &str,
) -> Result<SelectionOutcome, TransportError> {
    let Some(request) = parse_callback_data(data).and_then(|token| deps.tokens.take(token)) else {
        log::info!("Rejected stale selection from chat {}", chat_id);
        return Ok(SelectionOutcome::Expired);
    };

    log::info!("[{}] Selected format {} in chat {}", short(&request.token), request.format_id, chat_id);
    let status = deps.transport.send_text(chat_id, STARTING_TEXT, None).await?;

    let pipeline = deps.pipeline.clone();
    let handle = tokio::spawn(async move { pipeline.run(status, request).await });
    Ok(SelectionOutcome::Started(handle))
}
