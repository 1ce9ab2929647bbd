//! Error types for sandbox-bench operations.
//!
//! Defines the error taxonomy shared by the benchmark subsystems:
//! - Provider operations (authentication, sandbox lifecycle, execution, files)
//! - Suite execution (crashes, timeouts, panics)
//! - Provider and suite registries
//! - Run configuration loading
//! - Benchmark runner setup
//! - Report export

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by a sandbox provider adapter.
///
/// `Authentication` and `SandboxCreation` are fatal to a benchmark run; every
/// other variant is scored as friction or an error on the phase that hit it.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Sandbox creation failed: {0}")]
    SandboxCreation(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("File operation on '{path}' failed: {reason}")]
    FileOperation { path: String, reason: String },

    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider used before authenticate")]
    NotAuthenticated,
}

impl ProviderError {
    /// Creates a timeout error for the named operation.
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Creates a file operation error.
    pub fn file(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::FileOperation {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns true if this error was caused by an expired timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors raised by a whole test suite rather than one of its phases.
///
/// The runner converts every variant into a single synthetic failing phase
/// named `<suite>_error`.
#[derive(Debug, Error)]
pub enum SuiteError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Suite crashed: {0}")]
    Crashed(String),

    #[error("Suite timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Suite panicked: {0}")]
    Panicked(String),
}

/// Errors from the provider and suite registries.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Unknown provider '{name}'. Available: {available}")]
    UnknownProvider { name: String, available: String },

    #[error("Unknown suite '{name}'. Available: {available}")]
    UnknownSuite { name: String, available: String },

    #[error("Name '{0}' is already registered")]
    DuplicateName(String),
}

/// Errors that can occur while loading or validating a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that prevent a benchmark run from starting.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Could not open provider session: {0}")]
    Session(ProviderError),
}

/// Errors that can occur while writing reports.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
