//! Results and traces for benchmark runs.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scoring::{score_result, Grade};
use crate::suites::SuiteOutcome;

/// One entry in a run's execution trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub timestamp: DateTime<Utc>,
    /// `authenticate`, `create_sandbox`, `<suite>/<phase>` or `destroy`.
    pub action: String,
    pub duration_ms: f64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

impl TraceEntry {
    pub fn new(action: impl Into<String>, duration: Duration, success: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            action: action.into(),
            duration_ms: duration.as_micros() as f64 / 1000.0,
            success,
            details: BTreeMap::new(),
        }
    }

    /// Adds a detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Complete result of benchmarking one provider once.
///
/// Built by the runner and sealed with [`BenchmarkResult::seal`], which
/// computes the score and grade exactly once. Both are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub provider: String,
    pub success: bool,
    pub total_time_seconds: f64,
    pub auth_time_seconds: f64,
    pub create_time_seconds: f64,
    /// Duration of `basic/execute_hello`, 0 when the basic suite did not run.
    pub execute_time_seconds: f64,
    /// Duration of `basic/file_io`, 0 when the basic suite did not run.
    pub file_io_time_seconds: f64,
    pub destroy_time_seconds: f64,
    /// Network calls counted by the provider session.
    pub tool_calls: u64,
    pub friction_points: u32,
    pub errors: u32,
    pub error_messages: Vec<String>,
    pub estimated_cost_usd: f64,
    pub discoverability_score: f64,
    /// Probed capabilities only.
    pub capabilities: BTreeMap<String, bool>,
    pub capability_score: f64,
    pub capability_conflicts: Vec<String>,
    pub suites_run: Vec<String>,
    pub suite_results: Vec<SuiteOutcome>,
    pub cold_start_seconds: Option<f64>,
    pub warm_start_seconds: Option<f64>,
    pub agent_spawn_seconds: Option<f64>,
    pub file_io_throughput_mbps: Option<f64>,
    score: f64,
    grade: Grade,
    pub trace: Vec<TraceEntry>,
}

impl BenchmarkResult {
    /// Creates an empty, unsealed, unsuccessful result.
    pub(crate) fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            success: false,
            total_time_seconds: 0.0,
            auth_time_seconds: 0.0,
            create_time_seconds: 0.0,
            execute_time_seconds: 0.0,
            file_io_time_seconds: 0.0,
            destroy_time_seconds: 0.0,
            tool_calls: 0,
            friction_points: 0,
            errors: 0,
            error_messages: Vec::new(),
            estimated_cost_usd: 0.0,
            discoverability_score: 0.0,
            capabilities: BTreeMap::new(),
            capability_score: 0.0,
            capability_conflicts: Vec::new(),
            suites_run: Vec::new(),
            suite_results: Vec::new(),
            cold_start_seconds: None,
            warm_start_seconds: None,
            agent_spawn_seconds: None,
            file_io_throughput_mbps: None,
            score: 0.0,
            grade: Grade::F,
            trace: Vec::new(),
        }
    }

    /// Computes score and grade from the collected metrics.
    pub(crate) fn seal(mut self) -> Self {
        let (score, grade) = score_result(&self);
        self.score = score;
        self.grade = grade;
        self
    }

    /// Records a hard error.
    pub(crate) fn record_error(&mut self, message: impl Into<String>) {
        self.errors += 1;
        self.error_messages.push(message.into());
    }

    /// Overall score, 0 to 100.
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Letter grade.
    pub fn grade(&self) -> Grade {
        self.grade
    }

    /// Looks up the phases of one suite.
    pub fn suite(&self, name: &str) -> Option<&SuiteOutcome> {
        self.suite_results.iter().find(|s| s.suite == name)
    }

    /// Trace entries for one action label.
    pub fn trace_for<'a>(&'a self, action: &'a str) -> impl Iterator<Item = &'a TraceEntry> + 'a {
        self.trace.iter().filter(move |t| t.action == action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsealed_result_is_failed() {
        let result = BenchmarkResult::new("docker-image");
        assert!(!result.success);
        assert_eq!(result.score(), 0.0);
        assert_eq!(result.grade(), Grade::F);
    }

    #[test]
    fn test_seal_failed_run_scores_zero() {
        let mut result = BenchmarkResult::new("docker-image");
        result.discoverability_score = 5.0;
        result.record_error("Auth failed: bad token");
        let result = result.seal();

        assert_eq!(result.score(), 0.0);
        assert_eq!(result.grade(), Grade::F);
        assert_eq!(result.errors, 1);
    }

    #[test]
    fn test_seal_successful_run() {
        let mut result = BenchmarkResult::new("docker-image");
        result.success = true;
        result.total_time_seconds = 30.0;
        result.tool_calls = 6;
        result.friction_points = 1;
        result.discoverability_score = 3.0;
        let result = result.seal();

        assert_eq!(result.score(), 88.2);
        assert_eq!(result.grade(), Grade::A);
    }

    #[test]
    fn test_serialized_keys() {
        let mut result = BenchmarkResult::new("http-agent");
        result
            .trace
            .push(TraceEntry::new("authenticate", Duration::from_millis(12), true));
        let json = serde_json::to_value(result.seal()).unwrap();

        for key in [
            "provider",
            "success",
            "total_time_seconds",
            "execute_time_seconds",
            "tool_calls",
            "capabilities",
            "capability_conflicts",
            "suite_results",
            "cold_start_seconds",
            "score",
            "grade",
            "trace",
        ] {
            assert!(json.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(json["grade"], "F");
        assert_eq!(json["trace"][0]["action"], "authenticate");
        assert_eq!(json["trace"][0]["duration_ms"], 12.0);
    }
}
