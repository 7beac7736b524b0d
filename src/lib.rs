//! vidrelay - Telegram bot that turns media links into chat attachments
//!
//! A user sends a URL, picks one of the encodings yt-dlp reports for it, and
//! receives the file back with a thumbnail and caption.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, disk admission and liveness endpoint
//! - `download`: format resolution, selection tokens, progress, pipeline and engine adapters
//! - `telegram`: chat transport, keyboards, credentials and the dispatcher schema

pub mod cli;
pub mod core;
pub mod download;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use download::{FormatResolver, Pipeline, SelectionTokenStore};
pub use telegram::{create_bot, schema, HandlerDeps};
