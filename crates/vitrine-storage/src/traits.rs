//! Presigning abstraction
//!
//! The gateway never talks to a storage SDK directly; it goes through [`Presigner`] so the
//! signer can be swapped for a mock in tests or a different S3-compatible provider.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Presign operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Presign failed: {0}")]
    PresignFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Turns a canonical storage key into a time-limited GET URL.
///
/// Implementations must be safe for concurrent use; one instance is shared by every
/// resolver through an `Arc`.
#[async_trait]
pub trait Presigner: Send + Sync {
    /// Sign a GET for `key`, valid for `expires_in`.
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Short backend identifier for log fields.
    fn backend_name(&self) -> &'static str;
}
