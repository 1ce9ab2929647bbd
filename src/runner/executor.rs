//! Benchmark executor: the per-run state machine and best-of-N selection.
//!
//! A single run moves through
//! `authenticate → create_sandbox → suites → destroy → finalize`
//! and never fails outward: every outcome, including a caught panic, ends up
//! in the returned [`BenchmarkResult`].

use std::any::Any;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use ordered_float::OrderedFloat;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::capabilities::aggregate_capabilities;
use crate::error::{RunnerError, SuiteError};
use crate::metrics::MetricsCollector;
use crate::pricing::estimate_sandbox_cost;
use crate::provider::{ProviderRegistry, SandboxProvider};
use crate::suites::performance::{AGENT_SPAWN_SECONDS, THROUGHPUT_MBPS, WARM_START_SECONDS};
use crate::suites::{bounded_call, PhaseResult, SuiteOutcome, SuiteRegistry};

use super::config::RunConfig;
use super::result::{BenchmarkResult, TraceEntry};
use super::sandbox::SandboxLease;

/// Drives providers through the benchmark.
pub struct BenchmarkRunner {
    config: RunConfig,
    providers: Arc<ProviderRegistry>,
    suites: Arc<SuiteRegistry>,
    /// Concrete suite names after alias expansion.
    suite_plan: Vec<String>,
    metrics: MetricsCollector,
}

impl BenchmarkRunner {
    /// Creates a runner, validating the configuration and resolving every
    /// provider and suite name up front.
    pub fn new(
        config: RunConfig,
        providers: Arc<ProviderRegistry>,
        suites: Arc<SuiteRegistry>,
    ) -> Result<Self, RunnerError> {
        config.validate()?;
        let suite_plan = suites.expand(&config.suites)?;
        for name in &config.providers {
            providers.factory(name)?;
        }

        debug!(suites = ?suite_plan, providers = ?config.providers, "Benchmark plan resolved");

        Ok(Self {
            config,
            providers,
            suites,
            suite_plan,
            metrics: MetricsCollector::new(),
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Suites each run executes, in order.
    pub fn suite_plan(&self) -> &[String] {
        &self.suite_plan
    }

    /// Benchmarks every configured provider and returns the best run of
    /// each, sorted by score (highest first).
    ///
    /// Providers without a credential are skipped; providers none of whose
    /// measured runs completed are omitted.
    pub async fn run_all(&self, credentials: &HashMap<String, String>) -> Vec<BenchmarkResult> {
        let mut results = Vec::new();

        for name in &self.config.providers {
            let Some(credential) = credentials.get(name) else {
                warn!("Skipping {}: no credential provided", name);
                continue;
            };

            info!("Benchmarking {}...", name);
            match self.benchmark_provider(name, credential).await {
                Some(best) => {
                    info!(
                        "  {}: {:.1}s, score {:.1}, grade {}",
                        name,
                        best.total_time_seconds,
                        best.score(),
                        best.grade()
                    );
                    self.metrics.record_score(name, best.score());
                    results.push(best);
                }
                None => {
                    warn!(provider = %name, "No measured run completed, omitting provider");
                    self.metrics.record_provider_omitted();
                }
            }
        }

        sort_by_score(&mut results);
        results
    }

    /// Runs the warmups and measured runs for one provider and returns the
    /// fastest completed measured run.
    pub async fn benchmark_provider(&self, name: &str, credential: &str) -> Option<BenchmarkResult> {
        for i in 0..self.config.warmup_runs {
            match self.run_once(name, credential).await {
                Ok(result) => debug!(
                    provider = %name,
                    warmup = i + 1,
                    success = result.success,
                    "Warmup run finished"
                ),
                Err(e) => debug!(provider = %name, warmup = i + 1, error = %e, "Warmup run failed"),
            }
        }

        let mut completed = Vec::new();
        for i in 0..self.config.measured_runs {
            match self.run_once(name, credential).await {
                Ok(result) => completed.push(result),
                Err(e) => warn!("  Run {} of {} failed: {}", i + 1, name, e),
            }
        }

        select_best(completed)
    }

    /// Builds a fresh provider session and runs it once.
    ///
    /// Errors only when the session cannot be constructed; a run that fails
    /// inside is still a completed run.
    pub async fn run_once(&self, name: &str, credential: &str) -> Result<BenchmarkResult, RunnerError> {
        let factory = self.providers.factory(name)?;
        let provider = factory().map_err(RunnerError::Session)?;
        Ok(self.run_single(provider.as_ref(), credential).await)
    }

    /// Runs the full state machine against one provider session.
    pub async fn run_single(&self, provider: &dyn SandboxProvider, credential: &str) -> BenchmarkResult {
        let started = Instant::now();
        provider.reset_api_call_count();

        let mut result = BenchmarkResult::new(provider.name());
        result.discoverability_score = provider.discoverability_score();
        let mut lease = SandboxLease::new(provider, self.config.phase_timeout());

        let driven = AssertUnwindSafe(self.drive(provider, credential, &mut lease, &mut result))
            .catch_unwind()
            .await;
        if let Err(panic) = driven {
            let message = panic_message(panic.as_ref());
            error!(provider = %provider.name(), "Run aborted by unexpected fault: {}", message);
            result.success = false;
            result.record_error(format!("Unexpected fault: {message}"));
        }

        lease.release_quietly().await;
        self.finalize(result, provider, started.elapsed())
    }

    async fn drive(
        &self,
        provider: &dyn SandboxProvider,
        credential: &str,
        lease: &mut SandboxLease<'_>,
        result: &mut BenchmarkResult,
    ) {
        let phase_timeout = self.config.phase_timeout();

        let t0 = Instant::now();
        let auth =
            bounded_call("authenticate", phase_timeout, provider.authenticate(credential)).await;
        result.auth_time_seconds = t0.elapsed().as_secs_f64();
        match auth {
            Ok(()) => result
                .trace
                .push(TraceEntry::new("authenticate", t0.elapsed(), true)),
            Err(e) => {
                warn!(provider = %provider.name(), error = %e, "Authentication failed");
                result.record_error(format!("Auth failed: {e}"));
                result.trace.push(
                    TraceEntry::new("authenticate", t0.elapsed(), false)
                        .with_detail("error", e.to_string()),
                );
                return;
            }
        }

        let t0 = Instant::now();
        let created = bounded_call(
            "create_sandbox",
            phase_timeout,
            provider.create_sandbox(self.config.image.as_deref(), phase_timeout),
        )
        .await;
        result.create_time_seconds = t0.elapsed().as_secs_f64();
        let sandbox_id = match created {
            Ok(id) => {
                result.trace.push(
                    TraceEntry::new("create_sandbox", t0.elapsed(), true)
                        .with_detail("sandbox_id", id.clone()),
                );
                lease.acquire(id.clone());
                id
            }
            Err(e) => {
                warn!(provider = %provider.name(), error = %e, "Sandbox creation failed");
                result.record_error(format!("Create failed: {e}"));
                result.trace.push(
                    TraceEntry::new("create_sandbox", t0.elapsed(), false)
                        .with_detail("error", e.to_string()),
                );
                return;
            }
        };
        result.success = true;
        info!(provider = %provider.name(), sandbox = %sandbox_id, "Sandbox ready");

        for suite in &self.suite_plan {
            let outcome = self.run_suite(suite, provider, &sandbox_id).await;
            for phase in &outcome.phases {
                self.fold_phase(result, suite, phase);
            }
            result.suites_run.push(suite.clone());
            result.suite_results.push(outcome);
        }

        let t0 = Instant::now();
        if let Some(destroyed) = lease.release().await {
            result.destroy_time_seconds = t0.elapsed().as_secs_f64();
            match destroyed {
                Ok(()) => result
                    .trace
                    .push(TraceEntry::new("destroy", t0.elapsed(), true)),
                Err(e) => {
                    warn!(provider = %provider.name(), sandbox = %sandbox_id, error = %e, "Sandbox destroy failed");
                    self.metrics.record_cleanup_failure(provider.name());
                    result.record_error(format!("Destroy failed: {e}"));
                    result.trace.push(
                        TraceEntry::new("destroy", t0.elapsed(), false)
                            .with_detail("error", e.to_string()),
                    );
                }
            }
        }
    }

    /// Runs one suite, converting errors, panics and timeouts into a single
    /// `<suite>_error` phase.
    async fn run_suite(
        &self,
        name: &str,
        provider: &dyn SandboxProvider,
        sandbox_id: &str,
    ) -> SuiteOutcome {
        let started = Instant::now();
        let suite_timeout = self.config.suite_timeout();
        debug!(suite = %name, "Running suite");

        let outcome = match self.suites.create(name) {
            Ok(suite) => {
                let run = AssertUnwindSafe(suite.run(provider, sandbox_id)).catch_unwind();
                match tokio::time::timeout(suite_timeout, run).await {
                    Ok(Ok(ran)) => ran,
                    Ok(Err(panic)) => Err(SuiteError::Panicked(panic_message(panic.as_ref()))),
                    Err(_) => Err(SuiteError::TimedOut(suite_timeout)),
                }
            }
            Err(e) => Err(SuiteError::Crashed(e.to_string())),
        };

        match outcome {
            Ok(phases) => SuiteOutcome::new(name, phases),
            Err(e) => {
                warn!(suite = %name, error = %e, "Suite crashed");
                self.metrics.record_suite_crash(name);
                let crash = PhaseResult::suite_crash(name, started.elapsed(), e.to_string());
                SuiteOutcome::new(name, vec![crash])
            }
        }
    }

    fn fold_phase(&self, result: &mut BenchmarkResult, suite: &str, phase: &PhaseResult) {
        result.friction_points += phase.friction_points;
        result.errors += phase.errors;
        result.error_messages.extend(
            phase
                .error_messages
                .iter()
                .map(|m| format!("{suite}/{}: {m}", phase.name)),
        );

        let mut entry = TraceEntry::new(format!("{suite}/{}", phase.name), phase.duration(), phase.success);
        entry.details = phase.details.clone();
        if !phase.error_messages.is_empty() {
            entry = entry.with_detail("errors", phase.error_messages.clone());
        }
        result.trace.push(entry);

        self.metrics.record_phase(suite, phase.success);
    }

    fn finalize(
        &self,
        mut result: BenchmarkResult,
        provider: &dyn SandboxProvider,
        elapsed: Duration,
    ) -> BenchmarkResult {
        result.total_time_seconds = elapsed.as_secs_f64();
        result.estimated_cost_usd = estimate_sandbox_cost(provider.name(), result.total_time_seconds);
        result.tool_calls = provider.api_call_count();

        let report = aggregate_capabilities(result.suite_results.iter().flat_map(|s| s.phases.iter()));
        result.capability_score = report.score();
        result.capabilities = report.supported;
        result.capability_conflicts = report.conflicts;

        let phase_seconds = |suite: &str, phase: &str| {
            result
                .suite(suite)
                .and_then(|s| s.phase(phase))
                .map(|p| p.duration_seconds)
        };
        let phase_detail = |suite: &str, phase: &str, key: &str| {
            result
                .suite(suite)
                .and_then(|s| s.phase(phase))
                .and_then(|p| p.detail_f64(key))
        };

        let execute = phase_seconds("basic", "execute_hello").unwrap_or(0.0);
        let file_io = phase_seconds("basic", "file_io").unwrap_or(0.0);
        let ran_performance = result.suite("performance").is_some();
        let cold_start = ran_performance.then_some(result.create_time_seconds);
        let warm_start = phase_detail("performance", "warm_start", WARM_START_SECONDS);
        let agent_spawn = phase_detail("performance", "agent_spawn", AGENT_SPAWN_SECONDS);
        let throughput = phase_detail("performance", "file_io_1mb_write", THROUGHPUT_MBPS);

        result.execute_time_seconds = execute;
        result.file_io_time_seconds = file_io;
        result.cold_start_seconds = cold_start;
        result.warm_start_seconds = warm_start;
        result.agent_spawn_seconds = agent_spawn;
        result.file_io_throughput_mbps = throughput;

        let result = result.seal();
        self.metrics
            .record_run(&result.provider, result.success, result.total_time_seconds);
        debug!(
            provider = %result.provider,
            success = result.success,
            total_secs = result.total_time_seconds,
            tool_calls = result.tool_calls,
            score = result.score(),
            "Run finished"
        );
        result
    }
}

/// Picks the completed run with the lowest total time. Ties keep the
/// earliest run.
pub fn select_best(runs: Vec<BenchmarkResult>) -> Option<BenchmarkResult> {
    runs.into_iter()
        .min_by_key(|r| OrderedFloat(r.total_time_seconds))
}

/// Sorts results by score, highest first. Equal scores keep their order.
pub fn sort_by_score(results: &mut [BenchmarkResult]) {
    results.sort_by_key(|r| Reverse(OrderedFloat(r.score())));
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
