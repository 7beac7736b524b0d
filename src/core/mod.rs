//! Core utilities, configuration, and common functionality

pub mod config;
pub mod disk;
pub mod error;
pub mod health;
pub mod logging;

// Re-exports for convenience
pub use disk::{DfProbe, DiskGuard, StorageProbe};
pub use error::{AppError, AppResult};
pub use logging::{init_logger, log_startup_configuration};
