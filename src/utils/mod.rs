//! # Utility Modules
//!
//! Supporting utilities for logging and observability.
//!
//! ## Components
//! - **Logging**: `tracing-subscriber` setup driven by `LoggingConfig`
//! - **Metrics**: Thread-safe transport counters

pub mod logging;
pub mod metrics;

pub use metrics::{Metrics, MetricsSnapshot};
