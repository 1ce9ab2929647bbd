//! Configuration for benchmark batches.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for one benchmark batch across providers.
///
/// Suite names may include aliases such as `full`; they are expanded before
/// the batch starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Providers to benchmark, in order.
    pub providers: Vec<String>,
    /// Suites (or aliases) to run in every sandbox.
    pub suites: Vec<String>,
    /// Discarded runs per provider before measuring.
    pub warmup_runs: u32,
    /// Measured runs per provider; the fastest completed one is kept.
    pub measured_runs: u32,
    /// Ceiling for authenticate and create, also the sandbox lifetime.
    pub phase_timeout_secs: u64,
    /// Ceiling for one whole suite.
    pub suite_timeout_secs: u64,
    /// Image to request from providers that support one.
    pub image: Option<String>,
}

impl RunConfig {
    /// Creates a configuration with default counts and timeouts.
    pub fn new(providers: Vec<String>) -> Self {
        Self {
            providers,
            suites: vec!["basic".to_string()],
            warmup_runs: 1,
            measured_runs: 3,
            phase_timeout_secs: 300,
            suite_timeout_secs: 600,
            image: None,
        }
    }

    /// Loads a configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parses a configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Sets the providers to benchmark.
    pub fn with_providers(mut self, providers: Vec<String>) -> Self {
        self.providers = providers;
        self
    }

    /// Sets the suites to run.
    pub fn with_suites(mut self, suites: Vec<String>) -> Self {
        self.suites = suites;
        self
    }

    /// Sets the number of warmup runs.
    pub fn with_warmup_runs(mut self, runs: u32) -> Self {
        self.warmup_runs = runs;
        self
    }

    /// Sets the number of measured runs.
    pub fn with_measured_runs(mut self, runs: u32) -> Self {
        self.measured_runs = runs;
        self
    }

    /// Sets the authenticate/create timeout.
    pub fn with_phase_timeout(mut self, timeout: Duration) -> Self {
        self.phase_timeout_secs = whole_seconds(timeout);
        self
    }

    /// Sets the per-suite timeout.
    pub fn with_suite_timeout(mut self, timeout: Duration) -> Self {
        self.suite_timeout_secs = whole_seconds(timeout);
        self
    }

    /// Sets the image override.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn phase_timeout(&self) -> Duration {
        Duration::from_secs(self.phase_timeout_secs)
    }

    pub fn suite_timeout(&self) -> Duration {
        Duration::from_secs(self.suite_timeout_secs)
    }

    /// Checks counts and timeouts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::Invalid("no providers configured".to_string()));
        }
        if self.suites.is_empty() {
            return Err(ConfigError::Invalid("no suites configured".to_string()));
        }
        if self.measured_runs == 0 {
            return Err(ConfigError::Invalid(
                "measured_runs must be at least 1".to_string(),
            ));
        }
        if self.phase_timeout_secs == 0 || self.suite_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Rounds up to whole seconds so a sub-second timeout never becomes zero.
fn whole_seconds(timeout: Duration) -> u64 {
    timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0)
}
