//! Vitrine Core Library
//!
//! This crate provides the domain models, error types, configuration and constants
//! shared by the asset delivery and generation job crates.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{Config, DeliveryConfig, JobChannelConfig, StorageConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    Asset, AssetKind, AssetStatus, FailureReason, GeneratedImage, GenerationJob, JobStatus, Row,
    StatusUpdate,
};
