//! JSON report document.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::runner::{BenchmarkResult, RunConfig};

/// Configuration echo written at the top of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub providers: Vec<String>,
    /// Concrete suites, after alias expansion.
    pub suites: Vec<String>,
    pub warmup_runs: u32,
    /// Measured runs per provider.
    pub runs: u32,
}

/// A finished benchmark batch, ready to be written out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub config: ReportConfig,
    pub generated_at: DateTime<Utc>,
    /// One entry per provider, best score first.
    pub results: Vec<BenchmarkResult>,
}

impl BenchmarkReport {
    pub fn new(config: &RunConfig, suite_plan: &[String], results: Vec<BenchmarkResult>) -> Self {
        Self {
            config: ReportConfig {
                providers: config.providers.clone(),
                suites: suite_plan.to_vec(),
                warmup_runs: config.warmup_runs,
                runs: config.measured_runs,
            },
            generated_at: Utc::now(),
            results,
        }
    }

    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the report to `path`, creating parent directories as needed.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        tracing::info!("Report written to {}", path.display());
        Ok(())
    }
}
