//! Shared fixtures for the runner integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sandbox_bench::provider::{ApiCallCounter, ExecOutput, ProviderInfo};
use sandbox_bench::suites::{PhaseResult, TestSuite};
use sandbox_bench::{ProviderError, SandboxProvider, SuiteError};

pub const HELLO: &str = "Hello from sandbox-bench!";

/// Observations shared by every session a factory hands out.
#[derive(Debug, Default)]
pub struct MockState {
    pub sessions: AtomicUsize,
    pub auth_calls: AtomicUsize,
    pub created: Mutex<Vec<String>>,
    pub destroyed: Mutex<Vec<String>>,
}

impl MockState {
    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn destroyed(&self) -> Vec<String> {
        self.destroyed.lock().unwrap().clone()
    }
}

/// Scripted failures and delays for a mock provider.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    pub fail_auth: bool,
    pub panic_on_auth: bool,
    pub fail_create: bool,
    pub fail_destroy: bool,
    /// Authentication delay for the n-th session; missing entries mean none.
    pub auth_delays: Vec<Duration>,
    /// Delay before a sandbox is created.
    pub create_delay: Option<Duration>,
}

/// In-memory provider with shared, inspectable state.
pub struct MockProvider {
    name: String,
    info: ProviderInfo,
    behavior: MockBehavior,
    session: usize,
    state: Arc<MockState>,
    files: Mutex<HashMap<String, Vec<u8>>>,
    calls: ApiCallCounter,
}

impl MockProvider {
    pub fn new(name: &str, behavior: MockBehavior, state: Arc<MockState>) -> Self {
        let session = state.sessions.fetch_add(1, Ordering::SeqCst);
        Self {
            name: name.to_string(),
            info: ProviderInfo::new("Mock", "in-memory test provider", "https://example.invalid")
                .with_mcp_server(),
            behavior,
            session,
            state,
            files: Mutex::new(HashMap::new()),
            calls: ApiCallCounter::new(),
        }
    }
}

#[async_trait]
impl SandboxProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn authenticate(&self, credential: &str) -> Result<(), ProviderError> {
        self.state.auth_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.behavior.auth_delays.get(self.session) {
            tokio::time::sleep(*delay).await;
        }
        if self.behavior.panic_on_auth {
            panic!("auth exploded");
        }
        if self.behavior.fail_auth || credential.is_empty() {
            return Err(ProviderError::Authentication("invalid token".into()));
        }
        Ok(())
    }

    async fn create_sandbox(
        &self,
        _image: Option<&str>,
        _timeout: Duration,
    ) -> Result<String, ProviderError> {
        self.calls.record();
        if let Some(delay) = self.behavior.create_delay {
            tokio::time::sleep(delay).await;
        }
        if self.behavior.fail_create {
            return Err(ProviderError::SandboxCreation("quota exceeded".into()));
        }
        let mut created = self.state.created.lock().unwrap();
        let id = format!("{}-{}-{}", self.name, self.session, created.len());
        created.push(id.clone());
        Ok(id)
    }

    async fn execute(
        &self,
        _sandbox_id: &str,
        code: &str,
        _language: &str,
        _timeout: Duration,
    ) -> Result<ExecOutput, ProviderError> {
        self.calls.record();
        if code.contains(HELLO) {
            Ok(ExecOutput::new(format!("{HELLO}\n"), "", 0))
        } else {
            Ok(ExecOutput::new("", "", 0))
        }
    }

    async fn write_file(
        &self,
        _sandbox_id: &str,
        path: &str,
        content: &[u8],
    ) -> Result<(), ProviderError> {
        self.calls.record();
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn read_file(&self, _sandbox_id: &str, path: &str) -> Result<Vec<u8>, ProviderError> {
        self.calls.record();
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| ProviderError::file(path, "no such file"))
    }

    async fn destroy(&self, sandbox_id: &str) -> Result<(), ProviderError> {
        self.calls.record();
        self.state
            .destroyed
            .lock()
            .unwrap()
            .push(sandbox_id.to_string());
        if self.behavior.fail_destroy {
            return Err(ProviderError::Unavailable("destroy endpoint down".into()));
        }
        Ok(())
    }

    fn api_call_count(&self) -> u64 {
        self.calls.get()
    }

    fn reset_api_call_count(&self) {
        self.calls.reset();
    }
}

/// How a [`MisbehavingSuite`] goes wrong.
#[derive(Debug, Clone, Copy)]
pub enum Misbehavior {
    Error,
    Panic,
    Hang,
}

/// Suite that fails as a whole.
pub struct MisbehavingSuite {
    pub name: &'static str,
    pub mode: Misbehavior,
}

#[async_trait]
impl TestSuite for MisbehavingSuite {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "suite that never finishes cleanly"
    }

    async fn run(
        &self,
        _provider: &dyn SandboxProvider,
        _sandbox_id: &str,
    ) -> Result<Vec<PhaseResult>, SuiteError> {
        match self.mode {
            Misbehavior::Error => Err(SuiteError::Crashed("setup script missing".into())),
            Misbehavior::Panic => panic!("suite exploded"),
            Misbehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }
}
