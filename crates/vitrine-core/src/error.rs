//! Error types module
//!
//! Errors that may cross crate boundaries. Asset resolution and job status reconciliation
//! never return these to callers; they surface only from job submission, where the caller
//! has to decide what to do.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like transport hiccups
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Self-description of an error for logging.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "TRANSPORT_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ErrorMetadata for AppError {
    fn error_code(&self) -> &'static str {
        match self {
            AppError::Transport(_) => "TRANSPORT_ERROR",
            AppError::Upstream { .. } => "UPSTREAM_ERROR",
            AppError::InvalidInput(_) => "INVALID_INPUT",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            AppError::Transport(_) => true,
            AppError::Upstream { status, .. } => *status >= 500 || *status == 429,
            AppError::InvalidInput(_) => false,
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            AppError::InvalidInput(_) => LogLevel::Debug,
            AppError::Transport(_) => LogLevel::Warn,
            AppError::Upstream { status, .. } if *status >= 500 || *status == 429 => LogLevel::Warn,
            AppError::Upstream { .. } => LogLevel::Error,
        }
    }
}
