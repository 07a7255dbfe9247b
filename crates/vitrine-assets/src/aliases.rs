//! Column alias tables.
//!
//! Rows have been written by several generations of the upload pipeline. Each logical field
//! lists every column name it has ever been stored under, newest first; the first non-null
//! column wins.

use serde_json::Value as JsonValue;
use vitrine_core::Row;

/// Ordered candidate column names for one logical field.
#[derive(Debug, Clone, Copy)]
pub struct AliasTable {
    pub field: &'static str,
    pub columns: &'static [&'static str],
}

impl AliasTable {
    pub const fn new(field: &'static str, columns: &'static [&'static str]) -> Self {
        Self { field, columns }
    }

    /// First non-null value among the candidate columns.
    pub fn first_present<'a>(&self, row: &'a Row) -> Option<&'a JsonValue> {
        self.columns
            .iter()
            .filter_map(|column| row.get(*column))
            .find(|value| !value.is_null())
    }

    /// Like [`first_present`](Self::first_present) but only yields strings. A non-string in
    /// the winning column yields `None` rather than falling through to later columns.
    pub fn first_str<'a>(&self, row: &'a Row) -> Option<&'a str> {
        self.first_present(row).and_then(JsonValue::as_str)
    }
}

pub const RAW_KEY: AliasTable = AliasTable::new(
    "raw_key",
    &["raw_key", "raw_r2_key", "raw_path", "raw_object_key"],
);

pub const FINAL_KEY: AliasTable = AliasTable::new(
    "final_key",
    &["final_key", "final_r2_key", "poster_key", "r2_key", "image_key"],
);

pub const RAW_URL: AliasTable =
    AliasTable::new("raw_url", &["raw_url", "raw_r2_url", "raw_signed_url"]);

pub const FINAL_URL: AliasTable = AliasTable::new(
    "final_url",
    &["final_url", "final_r2_url", "poster_url", "r2_url", "image_url"],
);

pub const PRICE: AliasTable =
    AliasTable::new("price", &["price", "listing_price", "buyout_price"]);

pub const LIKES: AliasTable = AliasTable::new("likes", &["likes_count", "likes"]);

pub const COVER_COLOR: AliasTable =
    AliasTable::new("cover_color", &["dominant_color", "cover_color"]);

pub const METADATA: AliasTable = AliasTable::new("metadata", &["metadata", "generation_data"]);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: JsonValue) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_first_non_null_wins() {
        let r = row(json!({"final_key": null, "poster_key": "p.png", "image_key": "i.png"}));
        assert_eq!(FINAL_KEY.first_str(&r), Some("p.png"));
    }

    #[test]
    fn test_order_is_respected() {
        let r = row(json!({"raw_object_key": "old.png", "raw_key": "new.png"}));
        assert_eq!(RAW_KEY.first_str(&r), Some("new.png"));
    }

    #[test]
    fn test_non_string_winner_does_not_fall_through() {
        let r = row(json!({"final_key": 42, "r2_key": "x.png"}));
        assert_eq!(FINAL_KEY.first_str(&r), None);
        assert_eq!(FINAL_KEY.first_present(&r), Some(&json!(42)));
    }

    #[test]
    fn test_absent_everywhere() {
        assert!(COVER_COLOR.first_present(&Row::new()).is_none());
    }
}
