//! Vitrine Assets Library
//!
//! Resolves raw, schema-drifted storage rows into canonical [`Asset`](vitrine_core::Asset)
//! values with fetchable URLs.

pub mod aliases;
pub mod allow;
pub mod resolver;

pub use allow::{asset_is_allowed, row_from_generated};
pub use resolver::{AssetResolver, ResolveOptions};
