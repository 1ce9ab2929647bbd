//! End-to-end runner behavior against in-memory providers.

mod common;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{Misbehavior, MisbehavingSuite, MockBehavior, MockProvider, MockState};
use sandbox_bench::export::BenchmarkReport;
use sandbox_bench::runner::{BenchmarkRunner, RunConfig};
use sandbox_bench::scoring::Grade;
use sandbox_bench::suites::{SuiteRegistry, TestSuite};
use sandbox_bench::{ProviderError, ProviderRegistry, SandboxProvider};

fn register_mock(
    registry: &mut ProviderRegistry,
    name: &'static str,
    behavior: MockBehavior,
) -> Arc<MockState> {
    let state = Arc::new(MockState::default());
    let shared = Arc::clone(&state);
    registry
        .register(name, move || {
            Ok(Box::new(MockProvider::new(name, behavior.clone(), Arc::clone(&shared)))
                as Box<dyn SandboxProvider>)
        })
        .unwrap();
    state
}

fn suites() -> SuiteRegistry {
    let mut registry = SuiteRegistry::builtin();
    for (name, mode) in [
        ("broken", Misbehavior::Error),
        ("panicky", Misbehavior::Panic),
        ("stuck", Misbehavior::Hang),
    ] {
        registry
            .register(name, move || {
                Box::new(MisbehavingSuite { name, mode }) as Box<dyn TestSuite>
            })
            .unwrap();
    }
    registry
}

fn runner(providers: ProviderRegistry, config: RunConfig) -> BenchmarkRunner {
    BenchmarkRunner::new(config, Arc::new(providers), Arc::new(suites())).unwrap()
}

fn single_run(providers: &[&str], suites: &[&str]) -> RunConfig {
    RunConfig::new(providers.iter().map(|p| p.to_string()).collect())
        .with_suites(suites.iter().map(|s| s.to_string()).collect())
        .with_warmup_runs(0)
        .with_measured_runs(1)
}

fn credentials(names: &[&str]) -> HashMap<String, String> {
    names
        .iter()
        .map(|n| (n.to_string(), "token".to_string()))
        .collect()
}

#[tokio::test]
async fn test_successful_basic_run() {
    let mut providers = ProviderRegistry::new();
    let state = register_mock(&mut providers, "mock", MockBehavior::default());
    let runner = runner(providers, single_run(&["mock"], &["basic"]));

    let results = runner.run_all(&credentials(&["mock"])).await;
    assert_eq!(results.len(), 1);
    let result = &results[0];

    assert!(result.success);
    assert_eq!(result.errors, 0);
    assert_eq!(result.suites_run, vec!["basic"]);
    // create + execute + write + read + destroy
    assert_eq!(result.tool_calls, 5);
    assert_eq!(result.discoverability_score, 4.0);
    assert!(result.score() > 80.0);
    assert_eq!(result.grade(), Grade::A);
    assert_eq!(state.created(), state.destroyed());
    assert_eq!(state.destroyed().len(), 1);
}

#[tokio::test]
async fn test_auth_failure_skips_create_and_destroy() {
    let mut providers = ProviderRegistry::new();
    let behavior = MockBehavior {
        fail_auth: true,
        ..Default::default()
    };
    let state = register_mock(&mut providers, "mock", behavior);
    let runner = runner(providers, single_run(&["mock"], &["basic"]));

    let result = runner.run_once("mock", "token").await.unwrap();

    assert!(!result.success);
    assert_eq!(result.score(), 0.0);
    assert_eq!(result.grade(), Grade::F);
    assert!(result.error_messages[0].starts_with("Auth failed"));
    assert!(result.suites_run.is_empty());
    assert_eq!(result.tool_calls, 0);
    assert!(state.created().is_empty());
    assert!(state.destroyed().is_empty());

    let auth = result.trace_for("authenticate").next().unwrap();
    assert!(!auth.success);
    assert!(auth.details.contains_key("error"));
}

#[tokio::test]
async fn test_create_failure_skips_destroy() {
    let mut providers = ProviderRegistry::new();
    let behavior = MockBehavior {
        fail_create: true,
        ..Default::default()
    };
    let state = register_mock(&mut providers, "mock", behavior);
    let runner = runner(providers, single_run(&["mock"], &["basic"]));

    let result = runner.run_once("mock", "token").await.unwrap();

    assert!(!result.success);
    assert!(result.error_messages[0].starts_with("Create failed"));
    assert_eq!(result.tool_calls, 1);
    assert!(state.destroyed().is_empty());
    assert_eq!(result.trace_for("destroy").count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_auth_timeout_is_fatal() {
    let mut providers = ProviderRegistry::new();
    let behavior = MockBehavior {
        auth_delays: vec![Duration::from_secs(30)],
        ..Default::default()
    };
    let state = register_mock(&mut providers, "mock", behavior);
    let config = single_run(&["mock"], &["basic"]).with_phase_timeout(Duration::from_secs(5));
    let runner = runner(providers, config);

    let result = runner.run_once("mock", "token").await.unwrap();

    assert!(!result.success);
    assert!(result.error_messages[0].starts_with("Auth failed"));
    assert!(result.error_messages[0].contains("timed out"));
    assert!((result.auth_time_seconds - 5.0).abs() < 0.01);
    assert!(result.suites_run.is_empty());
    assert!(state.created().is_empty());
    assert!(state.destroyed().is_empty());
    assert_eq!(result.trace_for("create_sandbox").count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_create_timeout_is_fatal() {
    let mut providers = ProviderRegistry::new();
    let behavior = MockBehavior {
        create_delay: Some(Duration::from_secs(30)),
        ..Default::default()
    };
    let state = register_mock(&mut providers, "mock", behavior);
    let config = single_run(&["mock"], &["basic"]).with_phase_timeout(Duration::from_secs(5));
    let runner = runner(providers, config);

    let result = runner.run_once("mock", "token").await.unwrap();

    assert!(!result.success);
    assert!(result.error_messages[0].starts_with("Create failed"));
    assert!(result.error_messages[0].contains("timed out"));
    assert!(result.suites_run.is_empty());
    assert!(state.created().is_empty());
    assert!(state.destroyed().is_empty());
    assert_eq!(result.trace_for("destroy").count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_suite_failures_are_isolated() {
    let mut providers = ProviderRegistry::new();
    let state = register_mock(&mut providers, "mock", MockBehavior::default());
    let config = single_run(&["mock"], &["broken", "panicky", "stuck", "basic"])
        .with_suite_timeout(Duration::from_secs(5));
    let runner = runner(providers, config);

    let result = runner.run_once("mock", "token").await.unwrap();

    assert!(result.success);
    assert_eq!(result.suites_run, vec!["broken", "panicky", "stuck", "basic"]);
    for suite in ["broken", "panicky", "stuck"] {
        let outcome = result.suite(suite).unwrap();
        assert_eq!(outcome.phases.len(), 1);
        let crash = &outcome.phases[0];
        assert_eq!(crash.name, format!("{suite}_error"));
        assert!(!crash.success);
        assert_eq!(crash.friction_points, 1);
        assert_eq!(crash.errors, 1);
    }
    assert!(result.suite("panicky").unwrap().phases[0].error_messages[0].contains("suite exploded"));
    assert!(result.suite("stuck").unwrap().phases[0].error_messages[0].contains("timed out"));

    let basic = result.suite("basic").unwrap();
    assert!(basic.all_passed());
    assert_eq!(result.errors, 3);
    assert_eq!(state.destroyed().len(), 1);
}

#[tokio::test]
async fn test_destroy_failure_keeps_success() {
    let mut providers = ProviderRegistry::new();
    let behavior = MockBehavior {
        fail_destroy: true,
        ..Default::default()
    };
    let state = register_mock(&mut providers, "mock", behavior);
    let runner = runner(providers, single_run(&["mock"], &["basic"]));

    let result = runner.run_once("mock", "token").await.unwrap();

    assert!(result.success);
    assert_eq!(result.errors, 1);
    assert!(result.error_messages[0].starts_with("Destroy failed"));
    assert_eq!(state.destroyed().len(), 1);
    let destroy = result.trace_for("destroy").next().unwrap();
    assert!(!destroy.success);
}

#[tokio::test]
async fn test_panic_outside_suites_is_contained() {
    let behavior = MockBehavior {
        panic_on_auth: true,
        ..Default::default()
    };
    let state = Arc::new(MockState::default());
    let provider = MockProvider::new("mock", behavior, Arc::clone(&state));
    let mut providers = ProviderRegistry::new();
    register_mock(&mut providers, "mock", MockBehavior::default());
    let runner = runner(providers, single_run(&["mock"], &["basic"]));

    let result = runner.run_single(&provider, "token").await;

    assert!(!result.success);
    assert!(result
        .error_messages
        .iter()
        .any(|m| m == "Unexpected fault: auth exploded"));
    assert!(state.created().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_best_of_n_keeps_fastest_run() {
    let mut providers = ProviderRegistry::new();
    let behavior = MockBehavior {
        auth_delays: vec![
            Duration::from_secs(1),
            Duration::from_secs(12),
            Duration::from_millis(9500),
            Duration::from_secs(15),
        ],
        ..Default::default()
    };
    let state = register_mock(&mut providers, "mock", behavior);
    let config = single_run(&["mock"], &["basic"])
        .with_warmup_runs(1)
        .with_measured_runs(3);
    let runner = runner(providers, config);

    let best = runner
        .benchmark_provider("mock", "token")
        .await
        .unwrap();

    assert!((best.total_time_seconds - 9.5).abs() < 0.01);
    assert_eq!(state.sessions.load(Ordering::SeqCst), 4);
    assert_eq!(state.created().len(), 4);
    assert_eq!(state.destroyed().len(), 4);
}

#[tokio::test]
async fn test_provider_without_completed_runs_is_omitted() {
    let mut providers = ProviderRegistry::new();
    register_mock(&mut providers, "good", MockBehavior::default());
    providers
        .register("unbuildable", || {
            Err(ProviderError::Unavailable("sdk missing".into()))
        })
        .unwrap();
    let runner = runner(providers, single_run(&["unbuildable", "good"], &["basic"]));

    let results = runner.run_all(&credentials(&["unbuildable", "good"])).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].provider, "good");
}

#[tokio::test]
async fn test_provider_without_credential_is_skipped() {
    let mut providers = ProviderRegistry::new();
    let state = register_mock(&mut providers, "mock", MockBehavior::default());
    let runner = runner(providers, single_run(&["mock"], &["basic"]));

    let results = runner.run_all(&HashMap::new()).await;

    assert!(results.is_empty());
    assert_eq!(state.sessions.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_results_sorted_by_score() {
    let mut providers = ProviderRegistry::new();
    let slow = MockBehavior {
        auth_delays: vec![Duration::from_secs(200)],
        ..Default::default()
    };
    register_mock(&mut providers, "slow", slow);
    register_mock(&mut providers, "fast", MockBehavior::default());
    let failing = MockBehavior {
        fail_create: true,
        ..Default::default()
    };
    register_mock(&mut providers, "failing", failing);
    let runner = runner(providers, single_run(&["failing", "slow", "fast"], &["basic"]));

    let results = runner
        .run_all(&credentials(&["failing", "slow", "fast"]))
        .await;

    let order: Vec<_> = results.iter().map(|r| r.provider.as_str()).collect();
    assert_eq!(order, vec!["fast", "slow", "failing"]);
    assert!(results[0].score() > results[1].score());
    assert_eq!(results[2].score(), 0.0);
}

#[tokio::test]
async fn test_report_contains_documented_keys() {
    let mut providers = ProviderRegistry::new();
    register_mock(&mut providers, "mock", MockBehavior::default());
    let runner = runner(providers, single_run(&["mock"], &["basic"]));
    let results = runner.run_all(&credentials(&["mock"])).await;

    let report = BenchmarkReport::new(runner.config(), runner.suite_plan(), results);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.json");
    report.write_json(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["config"]["providers"][0], "mock");
    assert_eq!(json["config"]["suites"][0], "basic");
    assert_eq!(json["config"]["warmup_runs"], 0);
    assert_eq!(json["config"]["runs"], 1);

    let result = &json["results"][0];
    for key in [
        "provider",
        "success",
        "total_time_seconds",
        "auth_time_seconds",
        "create_time_seconds",
        "execute_time_seconds",
        "file_io_time_seconds",
        "destroy_time_seconds",
        "tool_calls",
        "friction_points",
        "errors",
        "error_messages",
        "estimated_cost_usd",
        "discoverability_score",
        "score",
        "grade",
        "capabilities",
        "capability_score",
        "capability_conflicts",
        "suites_run",
        "suite_results",
        "cold_start_seconds",
        "warm_start_seconds",
        "agent_spawn_seconds",
        "file_io_throughput_mbps",
        "trace",
    ] {
        assert!(result.get(key).is_some(), "missing key {key}");
    }
    assert_eq!(result["suite_results"][0]["suite"], "basic");
    assert_eq!(result["suite_results"][0]["phases"][0]["name"], "execute_hello");
}
