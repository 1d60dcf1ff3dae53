//! Internal telemetry for the metric workers.
//!
//! Structured logs through `tracing`, process-local counters that are
//! periodically reported as a log line, and a small health registry.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
