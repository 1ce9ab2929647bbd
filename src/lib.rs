//! sandbox-bench: benchmark AI agent sandbox providers.
//!
//! Runs each provider through a fixed lifecycle (authenticate, create a
//! sandbox, run test suites, destroy) and scores the best of several runs on
//! speed, reliability, cost and capability coverage.

// Core modules
pub mod capabilities;
pub mod cli;
pub mod error;
pub mod export;
pub mod metrics;
pub mod pricing;
pub mod provider;
pub mod runner;
pub mod scoring;
pub mod suites;

// Re-export commonly used types
pub use error::{
    ConfigError, ExportError, ProviderError, RegistryError, RunnerError, SuiteError,
};
pub use provider::{ProviderRegistry, SandboxProvider};
pub use runner::{BenchmarkResult, BenchmarkRunner, RunConfig};
pub use suites::{SuiteRegistry, TestSuite};
