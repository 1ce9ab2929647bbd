//! Scoring and grading.
//!
//! Turns a finished run into a 0-100 score and a letter grade. Every cost
//! metric (time, tool calls, friction, errors, dollars) is normalized against
//! a ceiling where lower is better; discoverability and capability coverage
//! count upwards.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::runner::BenchmarkResult;
use crate::suites::phase::round_to;

/// Runs slower than this score zero on time.
pub const MAX_TIME_SECONDS: f64 = 300.0;
pub const MAX_TOOL_CALLS: f64 = 50.0;
pub const MAX_FRICTION: f64 = 5.0;
pub const MAX_ERRORS: f64 = 10.0;
pub const MAX_COST_USD: f64 = 5.0;
/// Discoverability is rated from 1 to 5.
pub const MAX_DISCOVERABILITY: f64 = 5.0;

/// Relative weight of each scored metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub time: f64,
    pub tool_calls: f64,
    pub friction: f64,
    pub errors: f64,
    pub cost: f64,
    pub discoverability: f64,
    pub capabilities: f64,
}

impl Weights {
    /// Weights used when no capability was probed.
    pub const BASE: Weights = Weights {
        time: 0.30,
        tool_calls: 0.15,
        friction: 0.15,
        errors: 0.20,
        cost: 0.10,
        discoverability: 0.10,
        capabilities: 0.0,
    };

    /// Weights used when the run produced capability data.
    pub const FULL: Weights = Weights {
        time: 0.25,
        tool_calls: 0.10,
        friction: 0.15,
        errors: 0.20,
        cost: 0.10,
        discoverability: 0.10,
        capabilities: 0.10,
    };

    /// Picks the weight set for a run.
    pub fn for_run(has_capabilities: bool) -> Weights {
        if has_capabilities {
            Self::FULL
        } else {
            Self::BASE
        }
    }

    pub fn sum(&self) -> f64 {
        self.time
            + self.tool_calls
            + self.friction
            + self.errors
            + self.cost
            + self.discoverability
            + self.capabilities
    }
}

/// Letter grade derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(letter)
    }
}

/// The metrics a score is computed from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreInputs {
    pub success: bool,
    pub total_time_seconds: f64,
    pub tool_calls: u64,
    pub friction_points: u32,
    pub errors: u32,
    pub estimated_cost_usd: f64,
    pub discoverability_score: f64,
    /// True when at least one capability was probed.
    pub has_capabilities: bool,
    pub capability_score: f64,
}

impl From<&BenchmarkResult> for ScoreInputs {
    fn from(result: &BenchmarkResult) -> Self {
        Self {
            success: result.success,
            total_time_seconds: result.total_time_seconds,
            tool_calls: result.tool_calls,
            friction_points: result.friction_points,
            errors: result.errors,
            estimated_cost_usd: result.estimated_cost_usd,
            discoverability_score: result.discoverability_score,
            has_capabilities: !result.capabilities.is_empty(),
            capability_score: result.capability_score,
        }
    }
}

/// Maps `value` onto `[0, 1]` against `max`, clamping at both ends.
pub fn normalize(value: f64, max: f64) -> f64 {
    if max <= 0.0 || !value.is_finite() {
        return 1.0;
    }
    (value / max).clamp(0.0, 1.0)
}

/// Score in `[0, 100]`, rounded to one decimal. Failed runs score 0.
pub fn calculate_score(inputs: &ScoreInputs) -> f64 {
    if !inputs.success {
        return 0.0;
    }

    let weights = Weights::for_run(inputs.has_capabilities);

    let time = normalize(inputs.total_time_seconds, MAX_TIME_SECONDS);
    let calls = normalize(inputs.tool_calls as f64, MAX_TOOL_CALLS);
    let friction = normalize(inputs.friction_points as f64, MAX_FRICTION);
    let errors = normalize(inputs.errors as f64, MAX_ERRORS);
    let cost = normalize(inputs.estimated_cost_usd, MAX_COST_USD);
    let discoverability = normalize(inputs.discoverability_score, MAX_DISCOVERABILITY);

    let mut score = (1.0 - time) * weights.time
        + (1.0 - calls) * weights.tool_calls
        + (1.0 - friction) * weights.friction
        + (1.0 - errors) * weights.errors
        + (1.0 - cost) * weights.cost
        + discoverability * weights.discoverability;

    if inputs.has_capabilities {
        score += inputs.capability_score.clamp(0.0, 1.0) * weights.capabilities;
    }

    round_to(score * 100.0, 1).clamp(0.0, 100.0)
}

/// Letter grade for a score.
pub fn calculate_grade(score: f64) -> Grade {
    if score >= 85.0 {
        Grade::A
    } else if score >= 70.0 {
        Grade::B
    } else if score >= 55.0 {
        Grade::C
    } else if score >= 40.0 {
        Grade::D
    } else {
        Grade::F
    }
}

/// Score and grade for a finished run.
pub fn score_result(result: &BenchmarkResult) -> (f64, Grade) {
    let score = calculate_score(&ScoreInputs::from(result));
    (score, calculate_grade(score))
}
