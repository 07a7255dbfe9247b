//! Storage gateway
//!
//! Wraps a [`Presigner`] so callers get `Option<String>` and never an error. A missing
//! configuration or a failing signer degrades to `None` and is reported once per gateway.

use crate::traits::Presigner;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use vitrine_core::constants::DEFAULT_PRESIGN_TTL_SECS;
use vitrine_core::StorageConfig;
use vitrine_infra::DedupLog;

/// Shared once-only category for "not configured" and "presign failed" warnings.
const PRESIGN_WARNING: &str = "presign";

type PresignerInit = Box<dyn Fn() -> Option<Arc<dyn Presigner>> + Send + Sync>;

pub struct StorageGateway {
    configured: bool,
    init: PresignerInit,
    presigner: OnceLock<Option<Arc<dyn Presigner>>>,
    default_ttl: Duration,
    warnings: DedupLog,
}

impl StorageGateway {
    /// Gateway whose S3 client is built on first use.
    ///
    /// `is_configured` is decided here from the presence of credentials; a client that
    /// then fails to build degrades exactly like a failed presign.
    #[cfg(feature = "storage-s3")]
    pub fn lazy(config: &StorageConfig) -> Self {
        let configured = config.is_complete();
        let default_ttl = config_ttl(config);
        let config = config.clone();
        let init: PresignerInit = Box::new(move || match crate::s3::S3Presigner::new(&config) {
            Ok(presigner) => Some(Arc::new(presigner) as Arc<dyn Presigner>),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build S3 presigner");
                None
            }
        });
        Self {
            configured,
            init,
            presigner: OnceLock::new(),
            default_ttl,
            warnings: DedupLog::new(),
        }
    }

    /// Gateway around an already-built presigner.
    pub fn with_presigner(presigner: Arc<dyn Presigner>, default_ttl: Duration) -> Self {
        let presigner = OnceLock::from(Some(presigner));
        Self {
            configured: true,
            init: Box::new(|| None),
            presigner,
            default_ttl,
            warnings: DedupLog::new(),
        }
    }

    /// Gateway that never presigns.
    pub fn disabled() -> Self {
        Self {
            configured: false,
            init: Box::new(|| None),
            presigner: OnceLock::new(),
            default_ttl: Duration::from_secs(DEFAULT_PRESIGN_TTL_SECS),
            warnings: DedupLog::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Number of presign warnings swallowed after the first one.
    pub fn suppressed_warnings(&self) -> u64 {
        self.warnings.suppressed(PRESIGN_WARNING)
    }

    /// Presign `key` for `ttl`. `None` for a missing key, a missing configuration or a
    /// signer failure.
    pub async fn presign(&self, key: Option<&str>, ttl: Duration) -> Option<String> {
        let key = key.map(str::trim).filter(|k| !k.is_empty())?;

        if !self.configured {
            self.warnings.once(PRESIGN_WARNING, || {
                tracing::warn!("Storage presigning is not configured; falling back to public URLs");
            });
            return None;
        }

        let presigner = self.presigner.get_or_init(|| (self.init)()).clone();
        let Some(presigner) = presigner else {
            self.warnings.once(PRESIGN_WARNING, || {
                tracing::warn!("Storage presigner unavailable; falling back to public URLs");
            });
            return None;
        };

        match presigner.presign_get(key, ttl).await {
            Ok(url) => Some(url),
            Err(e) => {
                self.warnings.once(PRESIGN_WARNING, || {
                    tracing::warn!(
                        backend = presigner.backend_name(),
                        key = %key,
                        error = %e,
                        "Presign failed; falling back to public URLs"
                    );
                });
                None
            }
        }
    }

    /// Presign with the configured default TTL.
    pub async fn presign_default(&self, key: Option<&str>) -> Option<String> {
        self.presign(key, self.default_ttl).await
    }
}

impl fmt::Debug for StorageGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageGateway")
            .field("configured", &self.configured)
            .field("initialized", &self.presigner.get().is_some())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

#[cfg(feature = "storage-s3")]
fn config_ttl(config: &StorageConfig) -> Duration {
    if config.presign_ttl_secs == 0 {
        Duration::from_secs(DEFAULT_PRESIGN_TTL_SECS)
    } else {
        config.presign_ttl()
    }
}
