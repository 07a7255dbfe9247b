//! Configuration module
//!
//! Configuration for object storage signing, URL delivery and the job status channels.
//! Every value is optional or defaulted: missing storage or delivery settings shrink the
//! URL fallback chain but never prevent the process from starting.

use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CLOSE_GRACE_MS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_POLL_MAX_ATTEMPTS,
    DEFAULT_PRESIGN_TTL_SECS, DEFAULT_RECONNECT_DELAY_MS, DEFAULT_STORAGE_REGION,
};

/// S3-compatible object storage used for presigning.
#[derive(Clone, Debug, Default)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    /// Custom domain used when signing, falls back to `endpoint`.
    pub signing_endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub bucket: Option<String>,
    pub region: String,
    pub presign_ttl_secs: u64,
}

impl StorageConfig {
    /// Presigning needs an endpoint, both credentials and a bucket.
    pub fn is_complete(&self) -> bool {
        self.endpoint.is_some()
            && self.access_key_id.is_some()
            && self.secret_access_key.is_some()
            && self.bucket.is_some()
    }

    pub fn presign_ttl(&self) -> Duration {
        Duration::from_secs(self.presign_ttl_secs)
    }
}

/// Public delivery bases used when presigning is unavailable or overridden.
#[derive(Clone, Debug, Default)]
pub struct DeliveryConfig {
    pub public_base_url: Option<String>,
    /// Takes precedence over every other URL source when set.
    pub cdn_base_url: Option<String>,
}

/// Timing for the push and pull job status transports.
#[derive(Clone, Debug)]
pub struct JobChannelConfig {
    pub api_base_url: String,
    pub poll_interval_ms: u64,
    pub poll_max_attempts: u32,
    pub close_grace_ms: u64,
    pub reconnect_delay_ms: u64,
}

impl Default for JobChannelConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000".to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            close_grace_ms: DEFAULT_CLOSE_GRACE_MS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
        }
    }
}

impl JobChannelConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn close_grace(&self) -> Duration {
        Duration::from_millis(self.close_grace_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub environment: String,
    /// Emit JSON log lines instead of the human-readable format.
    pub log_json: bool,
    pub storage: StorageConfig,
    pub delivery: DeliveryConfig,
    pub jobs: JobChannelConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            log_json: false,
            storage: StorageConfig {
                region: DEFAULT_STORAGE_REGION.to_string(),
                presign_ttl_secs: DEFAULT_PRESIGN_TTL_SECS,
                ..StorageConfig::default()
            },
            delivery: DeliveryConfig::default(),
            jobs: JobChannelConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment (and `.env` when present).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values are treated as unset.
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let parsed = |name: &str, default: u64| -> Result<u64, anyhow::Error> {
            match var(name) {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|_| anyhow::anyhow!("{} must be a valid number", name)),
                None => Ok(default),
            }
        };

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let storage = StorageConfig {
            endpoint: var("STORAGE_ENDPOINT"),
            signing_endpoint: var("STORAGE_SIGNING_ENDPOINT"),
            access_key_id: var("STORAGE_ACCESS_KEY_ID"),
            secret_access_key: var("STORAGE_SECRET_ACCESS_KEY"),
            bucket: var("STORAGE_BUCKET"),
            region: var("STORAGE_REGION").unwrap_or_else(|| DEFAULT_STORAGE_REGION.to_string()),
            presign_ttl_secs: parsed("PRESIGN_TTL_SECS", DEFAULT_PRESIGN_TTL_SECS)?,
        };

        let delivery = DeliveryConfig {
            public_base_url: var("PUBLIC_BASE_URL"),
            cdn_base_url: var("CDN_BASE_URL"),
        };

        let jobs = JobChannelConfig {
            api_base_url: var("JOB_API_BASE_URL")
                .unwrap_or_else(|| JobChannelConfig::default().api_base_url),
            poll_interval_ms: parsed("JOB_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?,
            poll_max_attempts: parsed("JOB_POLL_MAX_ATTEMPTS", DEFAULT_POLL_MAX_ATTEMPTS as u64)?
                .try_into()
                .map_err(|_| anyhow::anyhow!("JOB_POLL_MAX_ATTEMPTS is out of range"))?,
            close_grace_ms: parsed("JOB_CLOSE_GRACE_MS", DEFAULT_CLOSE_GRACE_MS)?,
            reconnect_delay_ms: parsed("JOB_RECONNECT_DELAY_MS", DEFAULT_RECONNECT_DELAY_MS)?,
        };

        let log_json = var("LOG_FORMAT")
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config = Config {
            environment,
            log_json,
            storage,
            delivery,
            jobs,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.jobs.poll_max_attempts == 0 {
            return Err(anyhow::anyhow!("JOB_POLL_MAX_ATTEMPTS must be at least 1"));
        }
        if self.jobs.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("JOB_POLL_INTERVAL_MS must be positive"));
        }
        if self.storage.presign_ttl_secs == 0 {
            return Err(anyhow::anyhow!("PRESIGN_TTL_SECS must be positive"));
        }
        for (name, value) in [
            ("PUBLIC_BASE_URL", &self.delivery.public_base_url),
            ("CDN_BASE_URL", &self.delivery.cdn_base_url),
            ("STORAGE_ENDPOINT", &self.storage.endpoint),
        ] {
            if let Some(url) = value {
                let lower = url.to_ascii_lowercase();
                if !lower.starts_with("http://") && !lower.starts_with("https://") {
                    return Err(anyhow::anyhow!("{} must be an absolute http(s) URL", name));
                }
            }
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn storage_bucket(&self) -> Option<&str> {
        self.storage.bucket.as_deref()
    }

    pub fn public_base_url(&self) -> Option<&str> {
        self.delivery.public_base_url.as_deref()
    }

    pub fn cdn_base_url(&self) -> Option<&str> {
        self.delivery.cdn_base_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, anyhow::Error> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|name| map.get(name).cloned())
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = load(&[]).unwrap();
        assert!(!config.storage.is_complete());
        assert_eq!(config.storage.region, "auto");
        assert_eq!(config.storage.presign_ttl_secs, 900);
        assert_eq!(config.jobs.poll_interval_ms, 2000);
        assert_eq!(config.jobs.poll_max_attempts, 60);
        assert!(config.public_base_url().is_none());
        assert!(!config.is_production());
        assert!(!config.log_json);
    }

    #[test]
    fn test_storage_complete_when_all_fields_present() {
        let config = load(&[
            ("STORAGE_ENDPOINT", "https://acct.r2.cloudflarestorage.com"),
            ("STORAGE_ACCESS_KEY_ID", "key"),
            ("STORAGE_SECRET_ACCESS_KEY", "secret"),
            ("STORAGE_BUCKET", "wardrobe"),
        ])
        .unwrap();
        assert!(config.storage.is_complete());
        assert_eq!(config.storage_bucket(), Some("wardrobe"));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = load(&[("PUBLIC_BASE_URL", "  "), ("CDN_BASE_URL", "")]).unwrap();
        assert!(config.public_base_url().is_none());
        assert!(config.cdn_base_url().is_none());
    }

    #[test]
    fn test_invalid_number_rejected() {
        let err = load(&[("JOB_POLL_MAX_ATTEMPTS", "lots")]).unwrap_err();
        assert!(err.to_string().contains("JOB_POLL_MAX_ATTEMPTS"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(load(&[("JOB_POLL_MAX_ATTEMPTS", "0")]).is_err());
    }

    #[test]
    fn test_relative_public_base_rejected() {
        assert!(load(&[("PUBLIC_BASE_URL", "cdn.example")]).is_err());
    }
}
