//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{Message, UserId};

use super::commands::{handle_selection, handle_start, handle_url, EXPIRED_ANSWER};
use super::types::{HandlerDeps, HandlerError};
use super::uploads::{store_cookies, store_cookies_document};
use crate::download::tokens::CALLBACK_PREFIX;
use crate::telegram::bot::Command;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Branch order matters: commands first, then cookies documents, then plain
/// text treated as a URL, then selection callbacks.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_documents = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(document_handler(deps_documents))
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

/// `None` for channel posts and other messages without a sender
fn sender(msg: &Message) -> Option<UserId> {
    msg.from.as_ref().map(|u| u.id)
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("🎯 Received command: {:?} from chat {}", cmd, msg.chat.id);
                let chat_id = msg.chat.id;

                match cmd {
                    Command::Start | Command::Help => {
                        handle_start(&deps, chat_id).await?;
                    }
                    Command::Dl(url) => {
                        handle_url(&deps, chat_id, sender(&msg), &url).await?;
                    }
                    Command::Cookies(text) => match msg.document() {
                        Some(document) => {
                            store_cookies_document(&bot, &deps, chat_id, sender(&msg), document).await?;
                        }
                        None => {
                            store_cookies(&deps, chat_id, sender(&msg), text.trim().as_bytes()).await?;
                        }
                    },
                }
                Ok(())
            }
        },
    ))
}

/// Any document is taken as a cookies file
fn document_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.document().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                if let Some(document) = msg.document() {
                    store_cookies_document(&bot, &deps, msg.chat.id, sender(&msg), document).await?;
                }
                Ok(())
            }
        })
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(move |msg: Message| {
            let deps = deps.clone();
            async move {
                let text = msg.text().unwrap_or_default();
                handle_url(&deps, msg.chat.id, sender(&msg), text).await?;
                Ok(())
            }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query()
        .filter(|q: CallbackQuery| q.data.as_deref().is_some_and(|d| d.starts_with(CALLBACK_PREFIX)))
        .endpoint(move |bot: Bot, q: CallbackQuery| {
            let deps = deps.clone();
            async move {
                let data = q.data.clone().unwrap_or_default();
                let Some(chat_id) = q.message.as_ref().map(|m| m.chat().id) else {
                    bot.answer_callback_query(q.id.clone()).text(EXPIRED_ANSWER).await?;
                    return Ok(());
                };

                let outcome = handle_selection(&deps, chat_id, &data).await;
                let answer = match &outcome {
                    Ok(outcome) => outcome.answer_text(),
                    Err(_) => "Something went wrong, please try again.",
                };
                bot.answer_callback_query(q.id.clone()).text(answer).await?;
                outcome?;
                Ok(())
            }
        })
}
