//! Telemetry module for the Integration Hub
//!
//! Prometheus metrics for health checks, webhooks, workflow runs and store
//! sizes, exposed as text at `GET /metrics`.

pub mod metrics;

pub use metrics::{HubMetrics, HubMetricsRegistry, ProbeTimer};

use thiserror::Error;

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Encoding error: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
