//! Asset resolution
//!
//! URL precedence per side is CDN override, then presigned URL, then a URL derived from the
//! public base, then whatever URL the row stored. Raw renditions of non-public assets are
//! only ever handed out presigned once the storage gateway is configured.

use crate::aliases::{COVER_COLOR, FINAL_KEY, FINAL_URL, LIKES, METADATA, PRICE, RAW_KEY, RAW_URL};
use futures::future::join_all;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::sync::Arc;
use vitrine_core::constants::{DEFAULT_ASSET_TITLE, PLACEHOLDER_URL};
use vitrine_core::{Asset, AssetKind, AssetStatus, Config, DeliveryConfig, Row};
use vitrine_storage::{ensure_https, is_absolute_url, KeyNormalizer, StorageGateway};

/// Per-request resolution options.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub kind: AssetKind,
    /// Presign the raw rendition even when rendering the final one.
    pub include_raw: bool,
    /// Ids the viewer has liked. `None` leaves `is_liked` unset.
    pub liked_ids: Option<HashSet<String>>,
}

impl ResolveOptions {
    pub fn new(kind: AssetKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn include_raw(mut self) -> Self {
        self.include_raw = true;
        self
    }

    pub fn with_liked_ids(mut self, liked_ids: HashSet<String>) -> Self {
        self.liked_ids = Some(liked_ids);
        self
    }
}

/// Resolved state of one rendition (raw or final).
struct Side {
    key: Option<String>,
    stored_url: Option<String>,
    url: Option<String>,
}

impl Side {
    fn read(normalizer: &KeyNormalizer, key: Option<&str>, url: Option<&str>) -> Self {
        let stored_url = url.map(ensure_https);
        Self {
            key: normalizer.normalize(key),
            url: stored_url.clone(),
            stored_url,
        }
    }

    fn has_absolute_url(&self) -> bool {
        self.url.as_deref().is_some_and(is_absolute_url)
    }

    /// Stored URL that is actually a key (relative path), normalized.
    fn stored_relative_key(&self, normalizer: &KeyNormalizer) -> Option<String> {
        self.stored_url
            .as_deref()
            .filter(|url| !is_absolute_url(url))
            .and_then(|url| normalizer.normalize(Some(url)))
    }
}

pub struct AssetResolver {
    gateway: Arc<StorageGateway>,
    normalizer: KeyNormalizer,
    public_base_url: Option<String>,
    cdn_base_url: Option<String>,
}

impl AssetResolver {
    pub fn new(
        gateway: Arc<StorageGateway>,
        normalizer: KeyNormalizer,
        delivery: &DeliveryConfig,
    ) -> Self {
        Self {
            gateway,
            normalizer,
            public_base_url: delivery.public_base_url.as_deref().and_then(normalize_base),
            cdn_base_url: delivery.cdn_base_url.as_deref().and_then(normalize_base),
        }
    }

    pub fn from_config(gateway: Arc<StorageGateway>, config: &Config) -> Self {
        Self::new(
            gateway,
            KeyNormalizer::new(config.storage.bucket.clone()),
            &config.delivery,
        )
    }

    pub fn normalizer(&self) -> &KeyNormalizer {
        &self.normalizer
    }

    /// Resolve one row. Never fails; `src` always carries something renderable.
    pub async fn resolve(&self, row: &Row, options: &ResolveOptions) -> Asset {
        let status = resolve_status(row);
        let id = string_field(row, "id").unwrap_or_default();

        let mut raw = Side::read(
            &self.normalizer,
            RAW_KEY.first_str(row),
            RAW_URL.first_str(row),
        );
        let mut fin = Side::read(
            &self.normalizer,
            FINAL_KEY.first_str(row),
            FINAL_URL.first_str(row),
        );

        // Permanent URLs must not leak the raw rendition of a non-public asset.
        let signed_raw_only = status.requires_signed_access() && self.gateway.is_configured();
        if signed_raw_only {
            raw.url = None;
        }

        let want_raw = options.kind == AssetKind::Raw || options.include_raw;
        if want_raw {
            self.resolve_raw(&mut raw, signed_raw_only).await;
        } else if !signed_raw_only {
            self.apply_public_fallbacks(&mut raw);
        }
        self.resolve_final(&mut fin).await;

        let src = match options.kind {
            AssetKind::Raw => raw.url.clone(),
            AssetKind::Final => fin.url.clone(),
        }
        .or_else(|| raw.url.clone())
        .or_else(|| fin.url.clone())
        .unwrap_or_else(|| PLACEHOLDER_URL.to_string());

        tracing::debug!(
            asset_id = %id,
            status = %status,
            kind = ?options.kind,
            placeholder = src == PLACEHOLDER_URL,
            "Asset resolved"
        );

        Asset {
            is_liked: options.liked_ids.as_ref().map(|liked| liked.contains(&id)),
            user_id: string_field(row, "user_id"),
            title: title_of(row),
            status,
            tags: tags_of(row),
            price: PRICE.first_present(row).and_then(coerce_number),
            likes: LIKES.first_present(row).and_then(coerce_count).unwrap_or(0),
            created_at: non_empty_str(row, "created_at"),
            updated_at: non_empty_str(row, "updated_at"),
            src,
            final_url: fin.url,
            raw_url: raw.url,
            final_key: fin.key,
            raw_key: raw.key,
            cover_color: COVER_COLOR.first_str(row).map(str::to_string),
            metadata: METADATA.first_present(row).cloned(),
            id,
        }
    }

    /// Resolve rows concurrently. Output order matches input order.
    pub async fn resolve_many(&self, rows: &[Row], options: &ResolveOptions) -> Vec<Asset> {
        join_all(rows.iter().map(|row| self.resolve(row, options))).await
    }

    async fn resolve_raw(&self, raw: &mut Side, signed_only: bool) {
        if !signed_only {
            if let Some(url) = self.cdn_url(raw.key.as_deref()) {
                raw.url = Some(url);
                return;
            }
        }

        if let Some(url) = self.presign_side(raw).await {
            raw.url = Some(url);
            return;
        }

        if !signed_only {
            self.apply_public_fallbacks(raw);
        }
    }

    async fn resolve_final(&self, fin: &mut Side) {
        if let Some(url) = self.cdn_url(fin.key.as_deref()) {
            fin.url = Some(url);
            return;
        }

        if !fin.has_absolute_url() {
            if let Some(url) = self.presign_side(fin).await {
                fin.url = Some(url);
                return;
            }
        }

        self.apply_public_fallbacks(fin);
    }

    /// Presign the side's key, then its stored URL when that URL is really a key.
    async fn presign_side(&self, side: &Side) -> Option<String> {
        if let Some(url) = self.gateway.presign_default(side.key.as_deref()).await {
            return Some(url);
        }
        let stored_key = side.stored_relative_key(&self.normalizer)?;
        self.gateway.presign_default(Some(&stored_key)).await
    }

    /// CDN override, or a URL derived from the public base when the side has none yet.
    fn apply_public_fallbacks(&self, side: &mut Side) {
        if let Some(url) = self.cdn_url(side.key.as_deref()) {
            side.url = Some(url);
            return;
        }
        if side.has_absolute_url() {
            return;
        }
        let key = side
            .key
            .clone()
            .or_else(|| side.stored_relative_key(&self.normalizer));
        if let Some(url) = join_base(self.public_base_url.as_deref(), key.as_deref()) {
            side.url = Some(url);
        }
    }

    fn cdn_url(&self, key: Option<&str>) -> Option<String> {
        join_base(self.cdn_base_url.as_deref(), key)
    }
}

fn normalize_base(base: &str) -> Option<String> {
    let trimmed = base.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn join_base(base: Option<&str>, key: Option<&str>) -> Option<String> {
    let base = base?;
    let key = key?.trim_start_matches('/');
    if key.is_empty() {
        return None;
    }
    Some(format!("{}/{}", base, key))
}

fn resolve_status(row: &Row) -> AssetStatus {
    if let Some(status) = row
        .get("status")
        .and_then(JsonValue::as_str)
        .and_then(|s| s.parse::<AssetStatus>().ok())
    {
        return status;
    }
    match row.get("is_public").and_then(JsonValue::as_bool) {
        Some(true) => AssetStatus::Public,
        _ => AssetStatus::Private,
    }
}

/// String or number column as a string; empty strings count as absent.
fn string_field(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty_str(row: &Row, column: &str) -> Option<String> {
    row.get(column)
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn title_of(row: &Row) -> String {
    non_empty_str(row, "title")
        .or_else(|| non_empty_str(row, "prompt"))
        .unwrap_or_else(|| DEFAULT_ASSET_TITLE.to_string())
}

fn tags_of(row: &Row) -> Vec<String> {
    row.get("tags")
        .and_then(JsonValue::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(JsonValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn coerce_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

fn coerce_count(value: &JsonValue) -> Option<i64> {
    match value {
        JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
