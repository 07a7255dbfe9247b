//! Vitrine Storage Library
//!
//! Turns storage object references into fetchable URLs.
//!
//! # Key format
//!
//! Keys are bucket-relative paths without a leading `/` (for example `catalog/x.png`).
//! Rows written over the years store them as bare keys, full URLs, or `bucket/key`
//! strings; [`KeyNormalizer`] folds all of these into the canonical form before any
//! signing happens.

pub mod factory;
pub mod gateway;
pub mod keys;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

// Re-export commonly used types
pub use factory::create_gateway;
pub use gateway::StorageGateway;
pub use keys::{ensure_https, is_absolute_url, KeyNormalizer};
#[cfg(feature = "storage-s3")]
pub use s3::S3Presigner;
pub use traits::{Presigner, StorageError, StorageResult};
