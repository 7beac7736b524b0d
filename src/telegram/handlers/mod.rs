//! Telegram bot handler tree configuration
//!
//! The dispatcher schema lives in `schema`; the logic behind each branch is
//! plain async functions over [`HandlerDeps`], so tests can drive it with a
//! fake transport instead of a live bot.

mod commands;
mod schema;
mod types;
mod uploads;

pub use commands::{
    handle_selection, handle_start, handle_url, parse_media_url, SelectionOutcome, EXPIRED_ANSWER, INVALID_URL_TEXT,
    NO_FORMATS_TEXT, STARTED_ANSWER, STARTING_TEXT, WELCOME_TEXT,
};
pub use schema::schema;
pub use types::{HandlerDeps, HandlerError};
pub use uploads::{store_cookies, COOKIES_SAVED_TEXT, COOKIES_USAGE_TEXT};
