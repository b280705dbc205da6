//! Observability infrastructure for OpenClear
//!
//! Structured logging via tracing and the Prometheus metrics exporter.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::init_metrics;
