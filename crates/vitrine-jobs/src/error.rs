use thiserror::Error;
use vitrine_core::AppError;

/// Errors inside a job channel. They are logged or turned into recoverable signals and
/// never become job failures on their own.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode payload: {0}")]
    Decode(String),

    #[error("Status endpoint returned HTTP {status}")]
    Http { status: u16 },
}

pub type ChannelResult<T> = Result<T, ChannelError>;

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChannelError::Decode(err.to_string())
        } else {
            ChannelError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ChannelError {
    fn from(err: serde_json::Error) -> Self {
        ChannelError::Decode(err.to_string())
    }
}

impl From<ChannelError> for AppError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Transport(msg) => AppError::Transport(msg),
            ChannelError::Decode(msg) => AppError::InvalidInput(msg),
            ChannelError::Http { status } => AppError::Upstream {
                status,
                body: String::new(),
            },
        }
    }
}
