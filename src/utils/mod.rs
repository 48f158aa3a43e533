//! # Utility Modules
//!
//! Supporting utilities for logging, timeouts and observability.
//!
//! ## Components
//! - **Logging**: LAB126 log masks and `tracing` subscriber setup
//! - **Timeout**: access-timeout constants and async timeout wrapper
//! - **Metrics**: per-connection atomic counters

pub mod logging;
pub mod metrics;
pub mod timeout;

// Re-export public types for advanced users
pub use logging::LogMask;
pub use metrics::{Metrics, MetricsSnapshot};
