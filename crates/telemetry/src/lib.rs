//! Logging setup and in-process outcome counters.

#![deny(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Logging setup failures.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber could not be installed.
    #[error("logging setup failed: {0}")]
    Subscriber(String),
}

fn json_subscriber(default_filter: &str) -> impl tracing::Subscriber + Send + Sync {
    let fmt_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(std::io::stderr);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    Registry::default().with(filter).with(fmt_layer)
}

/// Install JSON logging on stderr with env filter (`RUST_LOG`, default "info").
/// Fails if a global subscriber is already set.
pub fn try_init_json_logging(default_filter: &str) -> Result<(), TelemetryError> {
    tracing::subscriber::set_global_default(json_subscriber(default_filter))
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))
}

/// Initialize structured logging (JSON) with env filter. Later calls are no-ops.
/// Set RUST_LOG, e.g., "info,billing=debug".
pub fn init_json_logging() {
    try_init_json_logging("info").ok();
}

/// Accepted/rejected request counters. Clones share the same counters.
#[derive(Clone, Debug, Default)]
pub struct OutcomeMetrics {
    accepted: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
}

impl OutcomeMetrics {
    /// Zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }
    /// Count one outcome.
    pub fn record(&self, accepted: bool) {
        let counter = if accepted { &self.accepted } else { &self.rejected };
        let _ = counter.fetch_add(1, Ordering::Relaxed);
    }
    /// `(accepted, rejected)`
    pub fn snapshot(&self) -> (u64, u64) {
        (self.accepted.load(Ordering::Relaxed), self.rejected.load(Ordering::Relaxed))
    }
    /// Outcomes recorded so far.
    pub fn total(&self) -> u64 {
        let (a, r) = self.snapshot();
        a + r
    }
}
