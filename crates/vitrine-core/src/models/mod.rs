pub mod asset;
pub mod job;

pub use asset::{Asset, AssetKind, AssetStatus, Row};
pub use job::{FailureReason, GeneratedImage, GenerationJob, JobStatus, StatusUpdate};
