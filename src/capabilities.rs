//! Capability aggregation.
//!
//! Phases may probe a named capability (e.g. "gcc"). The aggregator folds
//! every probe of a run into one support map. When several phases probe the
//! same capability, support requires every probe to pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::suites::PhaseResult;

/// Human-readable descriptions of the built-in capabilities.
const CAPABILITY_DESCRIPTIONS: &[(&str, &str)] = &[
    ("stdin_piping", "Pipe stdin to running process"),
    ("gcc", "GCC C compiler available"),
    ("gpp", "G++ C++ compiler available"),
    ("exec_timeout", "Server-side execution timeout enforcement"),
    ("python3", "Python 3 runtime available"),
    ("network_access", "Outbound network connectivity"),
    ("pip_install", "pip package installation"),
    ("git_clone", "Git clone from remote repositories"),
    ("pytest", "pytest test framework execution"),
    ("nodejs", "Node.js runtime available"),
    ("npm", "npm package manager and install"),
    ("project_clone", "Clone real-world project repos"),
    ("multi_step_build", "Multi-step build and test pipeline"),
    ("python_venv", "Python venv creation and use"),
    ("agent_spawn", "End-to-end sub-agent spawn to sandbox ready"),
    ("warm_start", "Warm/pre-warmed sandbox creation"),
];

/// Description of a built-in capability.
pub fn capability_description(name: &str) -> Option<&'static str> {
    CAPABILITY_DESCRIPTIONS
        .iter()
        .find(|(cap, _)| *cap == name)
        .map(|(_, desc)| *desc)
}

/// Names of all built-in capabilities, in suite order.
pub fn known_capabilities() -> impl Iterator<Item = &'static str> {
    CAPABILITY_DESCRIPTIONS.iter().map(|(cap, _)| *cap)
}

/// Aggregated capability support for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityReport {
    /// Probed capability → supported. Only probed capabilities appear.
    pub supported: BTreeMap<String, bool>,
    /// Capabilities whose probes disagreed.
    pub conflicts: Vec<String>,
}

impl CapabilityReport {
    /// Fraction of probed capabilities that are supported.
    pub fn score(&self) -> f64 {
        capability_score(&self.supported)
    }
}

/// Folds every capability probe into a support map.
pub fn aggregate_capabilities<'a, I>(phases: I) -> CapabilityReport
where
    I: IntoIterator<Item = &'a PhaseResult>,
{
    let mut report = CapabilityReport::default();

    for phase in phases {
        let Some(probe) = &phase.capability else {
            continue;
        };
        match report.supported.get_mut(&probe.name) {
            Some(current) => {
                if *current != probe.supported && !report.conflicts.contains(&probe.name) {
                    warn!(
                        capability = %probe.name,
                        phase = %phase.name,
                        "Conflicting capability probes, treating as unsupported"
                    );
                    report.conflicts.push(probe.name.clone());
                }
                *current = *current && probe.supported;
            }
            None => {
                report.supported.insert(probe.name.clone(), probe.supported);
            }
        }
    }

    report
}

/// Fraction of tested capabilities that are supported, or 0.0 when nothing
/// was tested.
pub fn capability_score(capabilities: &BTreeMap<String, bool>) -> f64 {
    if capabilities.is_empty() {
        return 0.0;
    }
    let supported = capabilities.values().filter(|v| **v).count();
    supported as f64 / capabilities.len() as f64
}
