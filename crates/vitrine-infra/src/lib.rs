//! Vitrine Infrastructure Library
//!
//! Shared infrastructure components:
//! - Telemetry initialization (tracing subscriber)
//! - Deduplicating log sink for degradations that would otherwise flood logs

pub mod dedup;

#[cfg(feature = "observability-basic")]
pub mod telemetry;

// Re-export commonly used types
pub use dedup::DedupLog;

#[cfg(feature = "observability-basic")]
pub use telemetry::init_telemetry;
