//! Sandbox provider interface.
//!
//! Every adapter implements [`SandboxProvider`]. The benchmark core only
//! talks to providers through this trait:
//! 1. Authenticate with a credential
//! 2. Create a sandbox and run commands or code inside it
//! 3. Move files in and out
//! 4. Destroy the sandbox
//!
//! Adapters count their own network calls so the runner can report real tool
//! usage instead of a manual tally.

pub mod docker;
pub mod http;
pub mod registry;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub use docker::DockerImageProvider;
pub use http::HttpAgentProvider;
pub use registry::{ProviderFactory, ProviderRegistry};

/// Language tag used by the default `execute_command` implementation.
pub const SHELL_LANGUAGE: &str = "sh";

/// Default timeout for a single command inside a sandbox.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(30);

/// Output of a command or code snippet executed in a sandbox.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
    /// Standard output captured.
    pub stdout: String,
    /// Standard error captured.
    pub stderr: String,
    /// Process exit code.
    pub exit_code: i64,
}

impl ExecOutput {
    /// Creates a new execution output.
    pub fn new(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i64) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Returns true if the process exited with code 0.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout followed by stderr, trimmed.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr).trim().to_string()
    }
}

/// Lifecycle status reported by a provider for one sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxStatus {
    Running,
    Stopped,
    Error(String),
    Unknown,
}

impl std::fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SandboxStatus::Running => write!(f, "running"),
            SandboxStatus::Stopped => write!(f, "stopped"),
            SandboxStatus::Error(msg) => write!(f, "error: {}", msg),
            SandboxStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Metadata describing how discoverable a provider's integration surface is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Human-readable provider name.
    pub display_name: String,
    /// Short description.
    pub description: String,
    /// Documentation URL.
    pub docs_url: String,
    /// Pricing page URL, if any.
    pub pricing_url: Option<String>,
    /// Whether the provider ships an MCP server.
    pub mcp_server: bool,
    /// Whether the provider publishes an OpenAPI spec.
    pub openapi_spec: bool,
    /// Whether the provider publishes an llms.txt.
    pub llms_txt: bool,
}

impl ProviderInfo {
    /// Creates provider metadata with no discoverability extras.
    pub fn new(
        display_name: impl Into<String>,
        description: impl Into<String>,
        docs_url: impl Into<String>,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            description: description.into(),
            docs_url: docs_url.into(),
            pricing_url: None,
            mcp_server: false,
            openapi_spec: false,
            llms_txt: false,
        }
    }

    /// Sets the pricing page URL.
    pub fn with_pricing_url(mut self, url: impl Into<String>) -> Self {
        self.pricing_url = Some(url.into());
        self
    }

    /// Marks the provider as shipping an MCP server.
    pub fn with_mcp_server(mut self) -> Self {
        self.mcp_server = true;
        self
    }

    /// Marks the provider as publishing an OpenAPI spec.
    pub fn with_openapi_spec(mut self) -> Self {
        self.openapi_spec = true;
        self
    }

    /// Marks the provider as publishing an llms.txt.
    pub fn with_llms_txt(mut self) -> Self {
        self.llms_txt = true;
        self
    }

    /// Discoverability rating from 1.0 to 5.0.
    ///
    /// Having docs is worth 3.0; an MCP server adds 1.0, an OpenAPI spec and
    /// an llms.txt add 0.5 each.
    pub fn discoverability_score(&self) -> f64 {
        let mut score = 3.0;
        if self.mcp_server {
            score += 1.0;
        }
        if self.openapi_spec {
            score += 0.5;
        }
        if self.llms_txt {
            score += 0.5;
        }
        f64::min(5.0, score)
    }
}

/// Monotonic counter of real network calls made by an adapter.
#[derive(Debug, Default)]
pub struct ApiCallCounter(AtomicU64);

impl ApiCallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one call.
    pub fn record(&self) {
        self.record_n(1);
    }

    /// Records `n` calls.
    pub fn record_n(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }
}

/// Trait implemented by every sandbox provider adapter.
///
/// One instance is one provider session: the runner builds a fresh instance
/// for every benchmark run, so adapters may keep per-session state behind
/// interior mutability.
#[async_trait]
pub trait SandboxProvider: Send + Sync {
    /// Registry name of this provider (e.g. "docker-image").
    fn name(&self) -> &str;

    /// Provider metadata.
    fn info(&self) -> &ProviderInfo;

    /// Authenticates with the provider.
    async fn authenticate(&self, credential: &str) -> Result<(), ProviderError>;

    /// Creates a sandbox and returns its id. `timeout` is the sandbox lifetime.
    async fn create_sandbox(
        &self,
        image: Option<&str>,
        timeout: Duration,
    ) -> Result<String, ProviderError>;

    /// Executes code in the given language inside the sandbox.
    async fn execute(
        &self,
        sandbox_id: &str,
        code: &str,
        language: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, ProviderError>;

    /// Executes a shell command inside the sandbox.
    async fn execute_command(
        &self,
        sandbox_id: &str,
        command: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, ProviderError> {
        self.execute(sandbox_id, command, SHELL_LANGUAGE, timeout)
            .await
    }

    /// Writes a file inside the sandbox.
    async fn write_file(
        &self,
        sandbox_id: &str,
        path: &str,
        content: &[u8],
    ) -> Result<(), ProviderError>;

    /// Reads a file from the sandbox.
    async fn read_file(&self, sandbox_id: &str, path: &str) -> Result<Vec<u8>, ProviderError>;

    /// Destroys the sandbox. Must tolerate an already-destroyed sandbox.
    async fn destroy(&self, sandbox_id: &str) -> Result<(), ProviderError>;

    /// Current status of the sandbox.
    async fn status(&self, _sandbox_id: &str) -> SandboxStatus {
        SandboxStatus::Unknown
    }

    /// Number of network calls since the last reset.
    fn api_call_count(&self) -> u64;

    /// Resets the network call counter.
    fn reset_api_call_count(&self);

    /// Discoverability rating from 1.0 to 5.0.
    fn discoverability_score(&self) -> f64 {
        self.info().discoverability_score()
    }
}
