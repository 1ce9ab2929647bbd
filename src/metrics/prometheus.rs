//! Prometheus metrics registration and export.
//!
//! Defines every metric sandbox-bench records and the functions to
//! initialize and export them.

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::sync::{Mutex, OnceLock};

/// Global Prometheus registry for all sandbox-bench metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Benchmark runs, labeled by provider and status (success/failure).
pub static RUNS_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Wall time of a benchmark run in seconds, labeled by provider.
pub static RUN_DURATION: OnceLock<HistogramVec> = OnceLock::new();

/// Phases executed, labeled by suite and status (passed/failed).
pub static PHASES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Whole-suite crashes (errors, panics, timeouts), labeled by suite.
pub static SUITE_CRASHES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Failed sandbox destroys, labeled by provider.
pub static CLEANUP_FAILURES_TOTAL: OnceLock<CounterVec> = OnceLock::new();

/// Score of the selected run, labeled by provider.
pub static PROVIDER_SCORE: OnceLock<GaugeVec> = OnceLock::new();

/// Providers dropped because none of their measured runs completed.
pub static PROVIDERS_OMITTED_TOTAL: OnceLock<IntCounter> = OnceLock::new();

/// Serializes initialization so every static comes from the same registry.
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Initialize all metrics and register them with the registry.
///
/// Call once at startup. Later calls are no-ops.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    let _guard = INIT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    if REGISTRY.get().is_some() {
        return Ok(());
    }

    let registry = Registry::new();

    let runs_total = CounterVec::new(
        Opts::new("sandbox_bench_runs_total", "Total benchmark runs"),
        &["provider", "status"],
    )?;

    let run_duration = HistogramVec::new(
        HistogramOpts::new(
            "sandbox_bench_run_duration_seconds",
            "Benchmark run wall time in seconds",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["provider"],
    )?;

    let phases_total = CounterVec::new(
        Opts::new("sandbox_bench_phases_total", "Total suite phases executed"),
        &["suite", "status"],
    )?;

    let suite_crashes_total = CounterVec::new(
        Opts::new(
            "sandbox_bench_suite_crashes_total",
            "Suites that crashed, panicked or timed out",
        ),
        &["suite"],
    )?;

    let cleanup_failures_total = CounterVec::new(
        Opts::new(
            "sandbox_bench_cleanup_failures_total",
            "Sandbox destroy calls that failed",
        ),
        &["provider"],
    )?;

    let provider_score = GaugeVec::new(
        Opts::new("sandbox_bench_provider_score", "Score of the selected run"),
        &["provider"],
    )?;

    let providers_omitted_total = IntCounter::new(
        "sandbox_bench_providers_omitted_total",
        "Providers with no completed measured run",
    )?;

    registry.register(Box::new(runs_total.clone()))?;
    registry.register(Box::new(run_duration.clone()))?;
    registry.register(Box::new(phases_total.clone()))?;
    registry.register(Box::new(suite_crashes_total.clone()))?;
    registry.register(Box::new(cleanup_failures_total.clone()))?;
    registry.register(Box::new(provider_score.clone()))?;
    registry.register(Box::new(providers_omitted_total.clone()))?;

    let _ = RUNS_TOTAL.set(runs_total);
    let _ = RUN_DURATION.set(run_duration);
    let _ = PHASES_TOTAL.set(phases_total);
    let _ = SUITE_CRASHES_TOTAL.set(suite_crashes_total);
    let _ = CLEANUP_FAILURES_TOTAL.set(cleanup_failures_total);
    let _ = PROVIDER_SCORE.set(provider_score);
    let _ = PROVIDERS_OMITTED_TOTAL.set(providers_omitted_total);
    let _ = REGISTRY.set(registry);

    tracing::debug!("Prometheus metrics initialized");

    Ok(())
}

/// Export all registered metrics in Prometheus text format.
///
/// Returns a comment line instead when metrics were never initialized or
/// encoding fails.
pub fn export_metrics() -> String {
    let Some(registry) = REGISTRY.get() else {
        return "# Metrics not initialized. Call init_metrics() first.\n".to_string();
    };

    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return format!("# Error encoding metrics: {}\n", e);
    }

    String::from_utf8(buffer)
        .unwrap_or_else(|e| format!("# Error converting metrics to UTF-8: {}\n", e))
}
