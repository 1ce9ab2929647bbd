//! Performance suite: secondary sandbox startup, bulk file I/O and
//! command latency.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;
use tracing::debug;

use crate::error::{ProviderError, SuiteError};
use crate::provider::{SandboxProvider, DEFAULT_EXEC_TIMEOUT};

use super::phase::round_to;
use super::{
    bounded_call, read_file, run_command, write_file, PhaseRecorder, PhaseResult, TestSuite,
    LIFECYCLE_TIMEOUT,
};

/// Lifetime requested for the short-lived secondary sandboxes.
const SECONDARY_SANDBOX_TIMEOUT: Duration = Duration::from_secs(60);

const ONE_MB: usize = 1024 * 1024;
const RAPID_EXEC_ITERATIONS: u32 = 10;
const RAPID_EXEC_MAX_FRICTION: u32 = 3;

const FILE_1MB: &str = "/tmp/bench-1mb.txt";
const FILE_10MB: &str = "/tmp/bench-10mb.txt";

/// Detail keys read back by the runner.
pub const AGENT_SPAWN_SECONDS: &str = "agent_spawn_seconds";
pub const WARM_START_SECONDS: &str = "warm_start_seconds";
pub const THROUGHPUT_MBPS: &str = "throughput_mbps";

fn megabytes_per_second(bytes: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (bytes as f64 / ONE_MB as f64) / secs
    } else {
        0.0
    }
}

/// Warm start time, file I/O throughput, rapid execution latency.
#[derive(Debug, Default, Clone, Copy)]
pub struct PerformanceSuite;

impl PerformanceSuite {
    async fn spawn(provider: &dyn SandboxProvider) -> Result<String, ProviderError> {
        bounded_call(
            "create_sandbox",
            LIFECYCLE_TIMEOUT,
            provider.create_sandbox(None, SECONDARY_SANDBOX_TIMEOUT),
        )
        .await
    }

    /// Destroys a secondary sandbox, ignoring failures.
    async fn discard(provider: &dyn SandboxProvider, sandbox_id: &str) {
        let destroyed =
            bounded_call("destroy", LIFECYCLE_TIMEOUT, provider.destroy(sandbox_id)).await;
        if let Err(e) = destroyed {
            debug!(sandbox = %sandbox_id, error = %e, "Failed to destroy secondary sandbox");
        }
    }

    /// Creates a second sandbox and runs a trivial command in it, measuring
    /// the path an orchestrator takes when handing work to a sub-agent.
    async fn agent_spawn(&self, provider: &dyn SandboxProvider) -> PhaseResult {
        let mut phase = PhaseRecorder::start("agent_spawn");

        let spawn_id = match Self::spawn(provider).await {
            Ok(id) => id,
            Err(e) => {
                phase.tool_call();
                phase.friction(e.to_string());
                phase.probe("agent_spawn", false);
                return phase.finish(false);
            }
        };
        let create_time = phase.elapsed();

        let exec_started = Instant::now();
        let result = run_command(provider, &spawn_id, "echo ready", DEFAULT_EXEC_TIMEOUT).await;
        let exec_time = exec_started.elapsed();
        let total = phase.elapsed();

        Self::discard(provider, &spawn_id).await;
        // create + exec + destroy
        phase.tool_calls(3);

        match result {
            Ok(output) => {
                let ready = output.is_success() && output.stdout.contains("ready");
                if !ready {
                    phase.add_friction(1);
                }
                phase.probe("agent_spawn", ready);
                phase.detail(AGENT_SPAWN_SECONDS, json!(round_to(total.as_secs_f64(), 4)));
                phase.detail("create_seconds", json!(round_to(create_time.as_secs_f64(), 4)));
                phase.detail("first_exec_seconds", json!(round_to(exec_time.as_secs_f64(), 4)));
                phase.finish_with_duration(ready, total)
            }
            Err(e) => {
                phase.friction(e.to_string());
                phase.probe("agent_spawn", false);
                phase.finish(false)
            }
        }
    }

    async fn warm_start(&self, provider: &dyn SandboxProvider) -> PhaseResult {
        let mut phase = PhaseRecorder::start("warm_start");

        match Self::spawn(provider).await {
            Ok(warm_id) => {
                let create_time = phase.elapsed();
                Self::discard(provider, &warm_id).await;
                // create + destroy
                phase.tool_calls(2);
                phase.probe("warm_start", true);
                phase.detail(WARM_START_SECONDS, json!(create_time.as_secs_f64()));
                phase.finish_with_duration(true, create_time)
            }
            Err(e) => {
                phase.tool_call();
                phase.friction(e.to_string());
                phase.probe("warm_start", false);
                phase.finish(false)
            }
        }
    }

    async fn write_1mb(&self, provider: &dyn SandboxProvider, sandbox_id: &str) -> PhaseResult {
        let mut phase = PhaseRecorder::start("file_io_1mb_write");
        phase.tool_call();
        let data = vec![b'x'; ONE_MB];

        match write_file(provider, sandbox_id, FILE_1MB, &data).await {
            Ok(()) => {
                let elapsed = phase.elapsed();
                phase.detail("size_mb", json!(1));
                phase.detail(
                    THROUGHPUT_MBPS,
                    json!(round_to(megabytes_per_second(ONE_MB, elapsed), 2)),
                );
                phase.finish_with_duration(true, elapsed)
            }
            Err(e) => {
                phase.friction(e.to_string());
                phase.finish(false)
            }
        }
    }

    async fn read_1mb(&self, provider: &dyn SandboxProvider, sandbox_id: &str) -> PhaseResult {
        let mut phase = PhaseRecorder::start("file_io_1mb_read");
        phase.tool_call();

        match read_file(provider, sandbox_id, FILE_1MB).await {
            Ok(content) => {
                let elapsed = phase.elapsed();
                let size_mb = content.len() as f64 / ONE_MB as f64;
                phase.detail("size_mb", json!(round_to(size_mb, 2)));
                phase.detail(
                    THROUGHPUT_MBPS,
                    json!(round_to(megabytes_per_second(content.len(), elapsed), 2)),
                );
                phase.finish_with_duration(true, elapsed)
            }
            Err(e) => {
                phase.friction(e.to_string());
                phase.finish(false)
            }
        }
    }

    async fn round_trip_10mb(&self, provider: &dyn SandboxProvider, sandbox_id: &str) -> PhaseResult {
        let mut phase = PhaseRecorder::start("file_io_10mb");
        phase.tool_calls(2);
        let data = vec![b'y'; 10 * ONE_MB];

        let result = async {
            let write_started = Instant::now();
            write_file(provider, sandbox_id, FILE_10MB, &data).await?;
            let write_elapsed = write_started.elapsed();

            let read_started = Instant::now();
            let content = read_file(provider, sandbox_id, FILE_10MB).await?;
            Ok::<_, ProviderError>((write_elapsed, read_started.elapsed(), content.len()))
        }
        .await;

        match result {
            Ok((write_elapsed, read_elapsed, read_len)) => {
                phase.detail(
                    "write_mbps",
                    json!(round_to(megabytes_per_second(data.len(), write_elapsed), 2)),
                );
                phase.detail(
                    "read_mbps",
                    json!(round_to(megabytes_per_second(read_len, read_elapsed), 2)),
                );
                phase.detail("write_seconds", json!(round_to(write_elapsed.as_secs_f64(), 3)));
                phase.detail("read_seconds", json!(round_to(read_elapsed.as_secs_f64(), 3)));
                phase.finish(true)
            }
            Err(e) => {
                phase.friction(e.to_string());
                phase.finish(false)
            }
        }
    }

    async fn rapid_exec(&self, provider: &dyn SandboxProvider, sandbox_id: &str) -> PhaseResult {
        let mut phase = PhaseRecorder::start("rapid_exec");
        let mut latencies = Vec::with_capacity(RAPID_EXEC_ITERATIONS as usize);
        let mut failures = 0u32;

        for _ in 0..RAPID_EXEC_ITERATIONS {
            let started = Instant::now();
            match run_command(provider, sandbox_id, "echo ok", DEFAULT_EXEC_TIMEOUT).await {
                Ok(output) => {
                    latencies.push(started.elapsed().as_secs_f64());
                    if !output.is_success() || !output.stdout.contains("ok") {
                        failures += 1;
                    }
                }
                Err(e) => {
                    phase.tool_calls(latencies.len() as u32 + 1);
                    phase.friction(e.to_string());
                    return phase.finish(false);
                }
            }
        }

        phase.tool_calls(RAPID_EXEC_ITERATIONS);
        phase.add_friction(failures.min(RAPID_EXEC_MAX_FRICTION));

        let ms = |secs: f64| round_to(secs * 1000.0, 1);
        let avg = latencies.iter().sum::<f64>() / latencies.len().max(1) as f64;
        let min = latencies.iter().copied().fold(f64::INFINITY, f64::min);
        let max = latencies.iter().copied().fold(0.0, f64::max);
        phase.detail("avg_latency_ms", json!(ms(avg)));
        phase.detail("min_latency_ms", json!(ms(if min.is_finite() { min } else { 0.0 })));
        phase.detail("max_latency_ms", json!(ms(max)));
        phase.detail("iterations", json!(RAPID_EXEC_ITERATIONS));
        phase.detail("failures", json!(failures));
        phase.finish(failures == 0)
    }
}

#[async_trait]
impl TestSuite for PerformanceSuite {
    fn name(&self) -> &str {
        "performance"
    }

    fn description(&self) -> &str {
        "Warm start time, file I/O throughput, rapid execution latency"
    }

    async fn run(
        &self,
        provider: &dyn SandboxProvider,
        sandbox_id: &str,
    ) -> Result<Vec<PhaseResult>, SuiteError> {
        Ok(vec![
            self.agent_spawn(provider).await,
            self.warm_start(provider).await,
            self.write_1mb(provider, sandbox_id).await,
            self.read_1mb(provider, sandbox_id).await,
            self.round_trip_10mb(provider, sandbox_id).await,
            self.rapid_exec(provider, sandbox_id).await,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suites::testing::ScriptedProvider;

    #[tokio::test]
    async fn test_performance_suite_phases() {
        let provider = ScriptedProvider::new()
            .on("echo ready", "ready\n", 0)
            .on("echo ok", "ok\n", 0);
        let phases = PerformanceSuite.run(&provider, "sb-main").await.unwrap();

        let names: Vec<_> = phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "agent_spawn",
                "warm_start",
                "file_io_1mb_write",
                "file_io_1mb_read",
                "file_io_10mb",
                "rapid_exec"
            ]
        );
        assert!(phases.iter().all(|p| p.success));
        assert!(phases[0].detail_f64(AGENT_SPAWN_SECONDS).is_some());
        assert!(phases[1].detail_f64(WARM_START_SECONDS).is_some());
        assert!(phases[2].detail_f64(THROUGHPUT_MBPS).is_some());
        assert_eq!(phases[3].detail_f64("size_mb"), Some(1.0));
        assert_eq!(phases[5].tool_calls, 10);
        assert_eq!(phases[5].detail_f64("failures"), Some(0.0));
    }

    #[tokio::test]
    async fn test_secondary_sandboxes_are_destroyed() {
        let provider = ScriptedProvider::new().on("echo ready", "ready", 0);
        PerformanceSuite.run(&provider, "sb-main").await.unwrap();

        let created = provider.created.lock().unwrap().clone();
        let destroyed = provider.destroyed.lock().unwrap().clone();
        assert_eq!(created.len(), 2);
        assert_eq!(created, destroyed);
        assert!(!destroyed.contains(&"sb-main".to_string()));
    }

    #[tokio::test]
    async fn test_agent_spawn_not_ready_still_destroys() {
        let provider = ScriptedProvider::new();
        let phases = PerformanceSuite.run(&provider, "sb-main").await.unwrap();

        let spawn = &phases[0];
        assert!(!spawn.success);
        assert_eq!(spawn.friction_points, 1);
        assert!(!spawn.capability.as_ref().unwrap().supported);
        assert_eq!(provider.destroyed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_failure_marks_capabilities_unsupported() {
        let mut provider = ScriptedProvider::new().on("echo ok", "ok", 0);
        provider.fail_create = true;
        let phases = PerformanceSuite.run(&provider, "sb-main").await.unwrap();

        assert!(!phases[0].success);
        assert!(!phases[1].success);
        assert_eq!(phases[0].tool_calls, 1);
        assert!(provider.destroyed.lock().unwrap().is_empty());
        assert!(phases[5].success);
    }

    #[tokio::test]
    async fn test_rapid_exec_friction_is_capped() {
        let provider = ScriptedProvider::new().on("echo ok", "", 1);
        let phases = PerformanceSuite.run(&provider, "sb-main").await.unwrap();

        let rapid = &phases[5];
        assert!(!rapid.success);
        assert_eq!(rapid.friction_points, 3);
        assert_eq!(rapid.detail_f64("failures"), Some(10.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_write_keeps_startup_results() {
        let mut provider = ScriptedProvider::new()
            .on("echo ready", "ready\n", 0)
            .on("echo ok", "ok\n", 0);
        provider.hang_path = Some(FILE_1MB.to_string());
        let phases = PerformanceSuite.run(&provider, "sb-main").await.unwrap();

        assert_eq!(phases.len(), 6);
        assert!(phases[0].success);
        assert!(phases[0].detail_f64(AGENT_SPAWN_SECONDS).is_some());
        assert!(phases[1].success);
        assert!(phases[1].detail_f64(WARM_START_SECONDS).is_some());

        let write = &phases[2];
        assert!(!write.success);
        assert_eq!(write.friction_points, 1);
        assert!(write.error_messages[0].contains("write_file timed out"));
        assert_eq!(write.duration_seconds, 60.0);

        assert!(!phases[3].success);
        assert!(phases[4].success);
        assert!(phases[5].success);
    }

    #[test]
    fn test_megabytes_per_second() {
        assert_eq!(megabytes_per_second(ONE_MB, Duration::from_millis(500)), 2.0);
        assert_eq!(megabytes_per_second(ONE_MB, Duration::ZERO), 0.0);
    }
}
