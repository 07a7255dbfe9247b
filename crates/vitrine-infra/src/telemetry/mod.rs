//! Tracing initialization
//!
//! Only the basic `tracing-subscriber` setup is provided; exporters are left to the host.

mod init_basic;

pub use init_basic::init_telemetry;
