use crate::config::ConfigError;
use thiserror::Error;

/// A specialized `Result` type for process-level operations.
pub type AppResult<T> = Result<T, AppError>;

/// Process-level error type.
///
/// Component failures (serial I/O, frame decoding, client commands) are
/// handled inside their owners; only what stops the agent from running at
/// all ends up here.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No available port in range {start}-{end}")]
    NoAvailablePort { start: u16, end: u16 },

    #[error("An I/O error occurred: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
