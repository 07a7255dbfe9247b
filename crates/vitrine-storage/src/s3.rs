use crate::traits::{Presigner, StorageError, StorageResult};
use async_trait::async_trait;
use http::Method;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::signer::Signer;
use std::time::Duration;
use vitrine_core::StorageConfig;

/// Presigner for S3-compatible object storage (R2, MinIO, AWS S3)
///
/// Signing is purely local: no request is made to the provider, the URL is computed from
/// the credentials and the endpoint.
#[derive(Clone)]
pub struct S3Presigner {
    store: AmazonS3,
    bucket: String,
}

impl S3Presigner {
    /// Build a presigner from storage configuration
    ///
    /// The signing endpoint (a custom domain bound to the bucket) is preferred over the
    /// API endpoint when both are set.
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let bucket = config
            .bucket
            .clone()
            .ok_or_else(|| StorageError::ConfigError("STORAGE_BUCKET not configured".to_string()))?;
        let access_key_id = config.access_key_id.clone().ok_or_else(|| {
            StorageError::ConfigError("STORAGE_ACCESS_KEY_ID not configured".to_string())
        })?;
        let secret_access_key = config.secret_access_key.clone().ok_or_else(|| {
            StorageError::ConfigError("STORAGE_SECRET_ACCESS_KEY not configured".to_string())
        })?;
        let endpoint = config
            .signing_endpoint
            .clone()
            .or_else(|| config.endpoint.clone())
            .ok_or_else(|| {
                StorageError::ConfigError("STORAGE_ENDPOINT not configured".to_string())
            })?;

        let allow_http = endpoint.starts_with("http://");
        let store = AmazonS3Builder::new()
            .with_region(config.region.clone())
            .with_bucket_name(bucket.clone())
            .with_access_key_id(access_key_id)
            .with_secret_access_key(secret_access_key)
            .with_endpoint(endpoint.clone())
            .with_allow_http(allow_http)
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        tracing::info!(
            bucket = %bucket,
            endpoint = %endpoint,
            region = %config.region,
            "S3 presigner initialized"
        );

        Ok(Self { store, bucket })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl Presigner for S3Presigner {
    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("empty key".to_string()));
        }

        let start = std::time::Instant::now();
        let location = Path::from(key.to_string());
        let url = self
            .store
            .signed_url(Method::GET, &location, expires_in)
            .await
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            expires_in_secs = expires_in.as_secs(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 presign successful"
        );

        Ok(url.to_string())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
