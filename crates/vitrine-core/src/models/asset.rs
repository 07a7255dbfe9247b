use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Untyped storage record as read from the database. Any subset of the known
/// column aliases may be present.
pub type Row = serde_json::Map<String, JsonValue>;

/// Visibility of an asset.
///
/// `Delisted` is a soft-deleted state. It is distinct from `Private` and is never
/// listable even though neither of them is public.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    Public,
    #[default]
    Private,
    Delisted,
}

impl AssetStatus {
    pub fn is_listable(&self) -> bool {
        matches!(self, AssetStatus::Public)
    }

    /// Whether the raw object must only be reachable through time-bounded URLs.
    pub fn requires_signed_access(&self) -> bool {
        !self.is_listable()
    }
}

impl Display for AssetStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AssetStatus::Public => write!(f, "public"),
            AssetStatus::Private => write!(f, "private"),
            AssetStatus::Delisted => write!(f, "delisted"),
        }
    }
}

impl FromStr for AssetStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(AssetStatus::Public),
            "private" => Ok(AssetStatus::Private),
            "delisted" => Ok(AssetStatus::Delisted),
            _ => Err(anyhow::anyhow!("Invalid asset status: {}", s)),
        }
    }
}

/// Which rendition the caller wants to render.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Raw,
    #[default]
    Final,
}

impl FromStr for AssetKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(AssetKind::Raw),
            "final" => Ok(AssetKind::Final),
            _ => Err(anyhow::anyhow!("Invalid asset kind: {}", s)),
        }
    }
}

/// Canonical asset handed to rendering code.
///
/// `src` is always populated; it falls back to a placeholder image so callers can
/// render without null checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub user_id: Option<String>,
    pub title: String,
    pub status: AssetStatus,
    pub tags: Vec<String>,
    pub price: Option<f64>,
    pub likes: i64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub src: String,
    pub final_url: Option<String>,
    pub raw_url: Option<String>,
    pub final_key: Option<String>,
    pub raw_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_color: Option<String>,
    /// Only set when the caller supplied the set of liked ids.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_liked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}
