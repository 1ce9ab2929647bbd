//! Phase results: the atomic outcome of one timed test step.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;

/// A named boolean feature probe recorded by a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityProbe {
    /// Capability name (e.g. "gcc").
    pub name: String,
    /// Whether the sandbox supports it.
    pub supported: bool,
}

/// Result of a single test phase within a suite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseResult {
    /// Phase name, unique within its suite.
    pub name: String,
    /// Whether the phase achieved its goal.
    pub success: bool,
    /// Wall time of the phase.
    pub duration_seconds: f64,
    /// Provider operations issued by the phase.
    pub tool_calls: u32,
    /// Non-fatal deviations from ideal behavior.
    pub friction_points: u32,
    /// Hard errors.
    pub errors: u32,
    /// Human-readable error messages.
    pub error_messages: Vec<String>,
    /// Capability probed by this phase, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability: Option<CapabilityProbe>,
    /// Free-form data for the trace.
    #[serde(default)]
    pub details: BTreeMap<String, Value>,
}

impl PhaseResult {
    /// Creates a phase result with no counters.
    pub fn new(name: impl Into<String>, success: bool, duration: Duration) -> Self {
        Self {
            name: name.into(),
            success,
            duration_seconds: duration.as_secs_f64(),
            tool_calls: 0,
            friction_points: 0,
            errors: 0,
            error_messages: Vec::new(),
            capability: None,
            details: BTreeMap::new(),
        }
    }

    /// The synthetic failing phase recorded when a whole suite crashes.
    pub fn suite_crash(suite: &str, duration: Duration, message: impl Into<String>) -> Self {
        Self::new(format!("{suite}_error"), false, duration)
            .with_friction(1)
            .with_error(message)
    }

    /// Sets the tool call count.
    pub fn with_tool_calls(mut self, n: u32) -> Self {
        self.tool_calls = n;
        self
    }

    /// Sets the friction point count.
    pub fn with_friction(mut self, n: u32) -> Self {
        self.friction_points = n;
        self
    }

    /// Adds an error message and bumps the error count.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.errors += 1;
        self.error_messages.push(message.into());
        self
    }

    /// Records a capability probe.
    pub fn with_capability(mut self, name: impl Into<String>, supported: bool) -> Self {
        self.capability = Some(CapabilityProbe {
            name: name.into(),
            supported,
        });
        self
    }

    /// Adds a detail entry.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Phase duration.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.duration_seconds.max(0.0))
    }

    /// Numeric detail, if present.
    pub fn detail_f64(&self, key: &str) -> Option<f64> {
        self.details.get(key).and_then(Value::as_f64)
    }
}

/// Accumulates a phase's counters while it runs.
///
/// Suites start a recorder, note tool calls, friction and errors as they go,
/// then call [`PhaseRecorder::finish`] to freeze the result with its elapsed
/// time.
#[derive(Debug)]
pub struct PhaseRecorder {
    started: Instant,
    result: PhaseResult,
}

impl PhaseRecorder {
    /// Starts timing a phase.
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            started: Instant::now(),
            result: PhaseResult::new(name, false, Duration::ZERO),
        }
    }

    /// Time since the phase started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Counts one provider operation.
    pub fn tool_call(&mut self) {
        self.result.tool_calls += 1;
    }

    /// Counts `n` provider operations.
    pub fn tool_calls(&mut self, n: u32) {
        self.result.tool_calls += n;
    }

    /// Records a friction point with its explanation.
    pub fn friction(&mut self, message: impl Into<String>) {
        self.result.friction_points += 1;
        self.result.error_messages.push(message.into());
    }

    /// Adds friction points without a message.
    pub fn add_friction(&mut self, n: u32) {
        self.result.friction_points += n;
    }

    /// Records a hard error.
    pub fn error(&mut self, message: impl Into<String>) {
        self.result.errors += 1;
        self.result.error_messages.push(message.into());
    }

    /// Records a message without changing counters.
    pub fn note(&mut self, message: impl Into<String>) {
        self.result.error_messages.push(message.into());
    }

    /// Records a capability probe.
    pub fn probe(&mut self, capability: &str, supported: bool) {
        self.result.capability = Some(CapabilityProbe {
            name: capability.to_string(),
            supported,
        });
    }

    /// Adds a detail entry.
    pub fn detail(&mut self, key: &str, value: impl Into<Value>) {
        self.result.details.insert(key.to_string(), value.into());
    }

    /// Freezes the phase, timing it up to now.
    pub fn finish(self, success: bool) -> PhaseResult {
        let elapsed = self.started.elapsed();
        self.finish_with_duration(success, elapsed)
    }

    /// Freezes the phase with an explicit duration.
    pub fn finish_with_duration(mut self, success: bool, duration: Duration) -> PhaseResult {
        self.result.success = success;
        self.result.duration_seconds = duration.as_secs_f64();
        self.result
    }
}

/// Rounds to `places` decimal places.
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
