//! Observability: structured logging and request metrics.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber (env-filter + fmt)
//! - Capture recent log lines in a bounded in-memory buffer for `/_logs`
//! - Record per-request metrics, optionally exported for Prometheus

pub mod logging;
pub mod metrics;
