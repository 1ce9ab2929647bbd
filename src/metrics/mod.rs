//! Metrics module for Prometheus-based monitoring.
//!
//! Counts benchmark runs, phases, suite crashes and cleanup failures, and
//! tracks the selected score per provider. The CLI can write the text
//! exposition to a file after a batch.
//!
//! # Example
//!
//! ```ignore
//! use sandbox_bench::metrics::{init_metrics, export_metrics, MetricsCollector};
//!
//! init_metrics().expect("Failed to initialize metrics");
//! let collector = MetricsCollector::new();
//! collector.record_phase("basic", true);
//! let metrics_text = export_metrics();
//! ```

pub mod collectors;
pub mod prometheus;

pub use collectors::MetricsCollector;
pub use prometheus::{export_metrics, init_metrics};

pub use prometheus::{
    CLEANUP_FAILURES_TOTAL, PHASES_TOTAL, PROVIDERS_OMITTED_TOTAL, PROVIDER_SCORE, REGISTRY,
    RUNS_TOTAL, RUN_DURATION, SUITE_CRASHES_TOTAL,
};
