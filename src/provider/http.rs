//! Provider for sandbox agents reachable over HTTP.
//!
//! Targets any VM or container image that runs a small agent exposing:
//!
//! ```text
//! GET  /health                              -> 200 when ready
//! POST /execute     {code, language, timeout_seconds} -> {stdout, stderr, exit_code}
//! POST /write_file  {path, content_base64}  -> 200
//! POST /read_file   {path}                  -> {content_base64}
//! ```
//!
//! The credential is the agent's base URL. The agent's lifecycle is managed
//! outside the benchmark, so sandboxes are logical handles and `destroy` only
//! forgets them.

use std::collections::HashSet;
use std::sync::{Mutex, OnceLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::ProviderError;

use super::{ApiCallCounter, ExecOutput, ProviderInfo, SandboxProvider, SandboxStatus};

/// Interval between readiness probes while creating a sandbox.
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Per-request timeout for health probes.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Serialize)]
struct ExecuteRequest<'a> {
    code: &'a str,
    language: &'a str,
    timeout_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct ExecuteResponse {
    #[serde(default)]
    stdout: String,
    #[serde(default)]
    stderr: String,
    #[serde(default)]
    exit_code: i64,
}

#[derive(Debug, Serialize)]
struct WriteFileRequest<'a> {
    path: &'a str,
    content_base64: String,
}

#[derive(Debug, Serialize)]
struct ReadFileRequest<'a> {
    path: &'a str,
}

#[derive(Debug, Deserialize)]
struct ReadFileResponse {
    content_base64: String,
}

/// Sandbox provider talking to an HTTP sandbox agent.
pub struct HttpAgentProvider {
    info: ProviderInfo,
    client: reqwest::Client,
    base_url: OnceLock<String>,
    live: Mutex<HashSet<String>>,
    calls: ApiCallCounter,
}

impl HttpAgentProvider {
    /// Registry name of this provider.
    pub const NAME: &'static str = "http-agent";

    /// Creates an unauthenticated provider session.
    pub fn new() -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::Unavailable(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            info: ProviderInfo::new(
                "HTTP Agent",
                "Any VM or container running the sandbox HTTP agent",
                "https://github.com/sandbox-bench/sandbox-bench#http-agent",
            ),
            client,
            base_url: OnceLock::new(),
            live: Mutex::new(HashSet::new()),
            calls: ApiCallCounter::new(),
        })
    }

    fn url(&self, route: &str) -> Result<String, ProviderError> {
        let base = self.base_url.get().ok_or(ProviderError::NotAuthenticated)?;
        Ok(format!("{base}{route}"))
    }

    fn is_live(&self, sandbox_id: &str) -> bool {
        self.live
            .lock()
            .map(|live| live.contains(sandbox_id))
            .unwrap_or(false)
    }

    fn ensure_live(&self, sandbox_id: &str) -> Result<(), ProviderError> {
        if self.is_live(sandbox_id) {
            Ok(())
        } else {
            Err(ProviderError::Execution(format!(
                "Unknown sandbox '{sandbox_id}'"
            )))
        }
    }

    async fn healthy(&self) -> Result<bool, ProviderError> {
        let url = self.url("/health")?;
        self.calls.record();
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                debug!(url = %url, error = %e, "Health probe failed");
                Ok(false)
            }
        }
    }

    /// POSTs a JSON body and decodes a JSON response.
    async fn post_json<B, R>(
        &self,
        url: String,
        body: &B,
        timeout: Duration,
    ) -> Result<R, reqwest::Error>
    where
        B: Serialize + ?Sized,
        R: for<'de> Deserialize<'de>,
    {
        self.calls.record();
        self.client
            .post(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?
            .json::<R>()
            .await
    }
}

#[async_trait]
impl SandboxProvider for HttpAgentProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn authenticate(&self, credential: &str) -> Result<(), ProviderError> {
        let base = credential.trim().trim_end_matches('/');
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ProviderError::Authentication(format!(
                "expected an http(s) agent URL, got '{base}'"
            )));
        }
        let _ = self.base_url.set(base.to_string());

        if !self.healthy().await? {
            return Err(ProviderError::Authentication(format!(
                "agent at {base} did not answer /health"
            )));
        }
        Ok(())
    }

    async fn create_sandbox(
        &self,
        _image: Option<&str>,
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        let started = Instant::now();
        while !self.healthy().await? {
            if started.elapsed() >= timeout {
                return Err(ProviderError::SandboxCreation(format!(
                    "agent not ready after {timeout:?}"
                )));
            }
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }

        let id = format!("http-{}", Uuid::new_v4());
        if let Ok(mut live) = self.live.lock() {
            live.insert(id.clone());
        }
        Ok(id)
    }

    async fn execute(
        &self,
        sandbox_id: &str,
        code: &str,
        language: &str,
        timeout: Duration,
    ) -> Result<ExecOutput, ProviderError> {
        self.ensure_live(sandbox_id)?;
        let request = ExecuteRequest {
            code,
            language,
            timeout_seconds: timeout.as_secs().max(1),
        };

        let response: ExecuteResponse = self
            .post_json(self.url("/execute")?, &request, timeout)
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::timeout("execute", timeout)
                } else {
                    ProviderError::Execution(e.to_string())
                }
            })?;

        Ok(ExecOutput::new(
            response.stdout,
            response.stderr,
            response.exit_code,
        ))
    }

    async fn write_file(
        &self,
        sandbox_id: &str,
        path: &str,
        content: &[u8],
    ) -> Result<(), ProviderError> {
        self.ensure_live(sandbox_id)?;
        let url = self.url("/write_file")?;
        let request = WriteFileRequest {
            path,
            content_base64: STANDARD.encode(content),
        };

        self.calls.record();
        self.client
            .post(url)
            .json(&request)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| ProviderError::file(path, e))?;
        Ok(())
    }

    async fn read_file(&self, sandbox_id: &str, path: &str) -> Result<Vec<u8>, ProviderError> {
        self.ensure_live(sandbox_id)?;
        let url = self.url("/read_file")?;
        let response: ReadFileResponse = self
            .post_json(url, &ReadFileRequest { path }, Duration::from_secs(60))
            .await
            .map_err(|e| ProviderError::file(path, e))?;

        STANDARD
            .decode(response.content_base64)
            .map_err(|e| ProviderError::file(path, e))
    }

    async fn destroy(&self, sandbox_id: &str) -> Result<(), ProviderError> {
        if let Ok(mut live) = self.live.lock() {
            live.remove(sandbox_id);
        }
        Ok(())
    }

    async fn status(&self, sandbox_id: &str) -> SandboxStatus {
        if !self.is_live(sandbox_id) {
            return SandboxStatus::Stopped;
        }
        match self.healthy().await {
            Ok(true) => SandboxStatus::Running,
            Ok(false) => SandboxStatus::Error("agent unhealthy".to_string()),
            Err(_) => SandboxStatus::Unknown,
        }
    }

    fn api_call_count(&self) -> u64 {
        self.calls.get()
    }

    fn reset_api_call_count(&self) {
        self.calls.reset();
    }
}
