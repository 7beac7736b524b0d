use thiserror::Error;

use crate::telegram::transport::TransportError;

/// Centralized error type for the process level.
///
/// Request-scoped failures have their own enums (`ResolutionError`,
/// `PipelineError`) and are turned into user-visible text where they occur;
/// `AppError` covers everything that can go wrong around them.
#[derive(Error, Debug)]
pub enum AppError {
    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// Chat transport errors
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
