//! Gallery allow-list and generated-image rows.

use serde_json::{json, Value as JsonValue};
use vitrine_core::constants::ALLOWED_KEY_PREFIXES;
use vitrine_core::{AssetStatus, GeneratedImage, Row};

const ALLOW_KEY_COLUMNS: &[&str] = &[
    "final_key",
    "raw_key",
    "r2_key",
    "image_key",
    "poster_key",
    "raw_path",
    "raw_r2_key",
    "final_r2_key",
];

const ALLOW_URL_COLUMNS: &[&str] = &["final_url", "raw_url", "r2_url", "image_url", "poster_url"];

/// True when any key or URL column points into one of the gallery prefixes.
pub fn asset_is_allowed(row: &Row) -> bool {
    ALLOW_KEY_COLUMNS
        .iter()
        .chain(ALLOW_URL_COLUMNS)
        .filter_map(|column| row.get(*column))
        .filter_map(column_text)
        .any(|value| {
            let lower = value.to_ascii_lowercase();
            ALLOWED_KEY_PREFIXES
                .iter()
                .any(|prefix| lower.contains(prefix))
        })
}

fn column_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Row for an image delivered by a completed generation job, ready for the resolver.
pub fn row_from_generated(image: &GeneratedImage) -> Row {
    let mut row = Row::new();
    row.insert("id".to_string(), json!(image.id));
    row.insert("final_url".to_string(), json!(image.url));
    row.insert("status".to_string(), json!(AssetStatus::Private.to_string()));
    row.insert(
        "metadata".to_string(),
        json!({
            "width": image.width,
            "height": image.height,
            "index": image.index,
        }),
    );
    row
}
