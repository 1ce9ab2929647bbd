//! Metrics collector facade.
//!
//! Wraps the Prometheus statics with benchmark-shaped recording methods.
//! Every method is a no-op until [`init_metrics`](super::init_metrics) has
//! run, so library users and tests never need to initialize metrics.

use super::prometheus::{
    CLEANUP_FAILURES_TOTAL, PHASES_TOTAL, PROVIDERS_OMITTED_TOTAL, PROVIDER_SCORE, RUNS_TOTAL,
    RUN_DURATION, SUITE_CRASHES_TOTAL,
};

/// Records sandbox-bench operational metrics.
///
/// # Example
///
/// ```ignore
/// use sandbox_bench::metrics::{init_metrics, MetricsCollector};
///
/// init_metrics().expect("Failed to init metrics");
/// let collector = MetricsCollector::new();
/// collector.record_run("docker-image", true, 12.5);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector;

impl MetricsCollector {
    pub fn new() -> Self {
        Self
    }

    /// Record a finished benchmark run.
    pub fn record_run(&self, provider: &str, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "failure" };

        if let Some(runs_total) = RUNS_TOTAL.get() {
            runs_total.with_label_values(&[provider, status]).inc();
        }

        if let Some(run_duration) = RUN_DURATION.get() {
            run_duration
                .with_label_values(&[provider])
                .observe(duration_secs);
        }

        tracing::trace!(
            provider = provider,
            status = status,
            duration_secs = duration_secs,
            "Recorded run metric"
        );
    }

    /// Record one phase outcome.
    pub fn record_phase(&self, suite: &str, passed: bool) {
        if let Some(phases_total) = PHASES_TOTAL.get() {
            let status = if passed { "passed" } else { "failed" };
            phases_total.with_label_values(&[suite, status]).inc();
        }
    }

    /// Record a suite that crashed as a whole.
    pub fn record_suite_crash(&self, suite: &str) {
        if let Some(crashes) = SUITE_CRASHES_TOTAL.get() {
            crashes.with_label_values(&[suite]).inc();
        }
    }

    /// Record a failed sandbox destroy.
    pub fn record_cleanup_failure(&self, provider: &str) {
        if let Some(failures) = CLEANUP_FAILURES_TOTAL.get() {
            failures.with_label_values(&[provider]).inc();
        }
    }

    /// Record the score of a provider's selected run.
    pub fn record_score(&self, provider: &str, score: f64) {
        if let Some(gauge) = PROVIDER_SCORE.get() {
            gauge.with_label_values(&[provider]).set(score);
        }
    }

    /// Record a provider dropped for lack of completed runs.
    pub fn record_provider_omitted(&self) {
        if let Some(omitted) = PROVIDERS_OMITTED_TOTAL.get() {
            omitted.inc();
        }
    }
}
