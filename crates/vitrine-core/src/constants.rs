//! Shared constants.

/// Image rendered when no URL could be resolved for an asset.
pub const PLACEHOLDER_URL: &str = "https://via.placeholder.com/640x960/EEECE6/999?text=Design";

/// Title used when a row carries neither a title nor a prompt.
pub const DEFAULT_ASSET_TITLE: &str = "Generated Design";

/// Lifetime of presigned GET URLs (15 minutes).
pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 15 * 60;

/// Region used for S3-compatible providers that ignore regions (R2).
pub const DEFAULT_STORAGE_REGION: &str = "auto";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// 60 attempts at 2s gives a two minute budget.
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 60;

/// Delay between a terminal push event and closing the stream.
pub const DEFAULT_CLOSE_GRACE_MS: u64 = 2_000;

pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 100;

/// Key prefixes that mark an object as belonging to the gallery.
pub const ALLOWED_KEY_PREFIXES: [&str; 3] = ["catalog/", "usergen/", "generated/"];
