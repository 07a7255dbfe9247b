use crate::StorageGateway;
use std::sync::Arc;
use vitrine_core::Config;

/// Create the shared storage gateway from configuration
///
/// Never fails: an incomplete storage section yields an unconfigured gateway and the
/// resolver falls back to public URLs.
pub fn create_gateway(config: &Config) -> Arc<StorageGateway> {
    #[cfg(feature = "storage-s3")]
    let gateway = StorageGateway::lazy(&config.storage);

    #[cfg(not(feature = "storage-s3"))]
    let gateway = {
        if config.storage.is_complete() {
            tracing::warn!("Storage is configured but the storage-s3 feature is not enabled");
        }
        StorageGateway::disabled()
    };

    tracing::info!(
        configured = gateway.is_configured(),
        bucket = config.storage_bucket().unwrap_or("-"),
        ttl_secs = gateway.default_ttl().as_secs(),
        "Storage gateway created"
    );

    Arc::new(gateway)
}
