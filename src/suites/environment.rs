//! Environment onramp suite: Node.js, npm, project checkout, multi-step
//! builds and Python virtualenvs.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SuiteError;
use crate::provider::{SandboxProvider, DEFAULT_EXEC_TIMEOUT};

use super::{check_command, write_file, CommandCheck, PhaseRecorder, PhaseResult, TestSuite};

/// Stdout kept in details for chatty build commands.
const BUILD_OUTPUT_LIMIT: usize = 500;

const PACKAGE_JSON_PATH: &str = "/tmp/npm-test/package.json";
const PACKAGE_JSON: &str =
    r#"{"name":"bench-test","version":"1.0.0","dependencies":{"express":"^4.18.0"}}"#;

/// Node.js setup, npm install, project clone, multi-step builds, venv.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvironmentSuite;

impl EnvironmentSuite {
    async fn node_available(&self, provider: &dyn SandboxProvider, sandbox_id: &str) -> PhaseResult {
        let mut phase = check_command(
            provider,
            sandbox_id,
            CommandCheck {
                phase: "node_available",
                capability: "nodejs",
                command: "node --version",
                timeout: DEFAULT_EXEC_TIMEOUT,
                tool_calls: 1,
                stdout_limit: None,
            },
            |out| out.is_success() && out.stdout.trim().starts_with('v'),
        )
        .await;

        if let Some(stdout) = phase.details.get("stdout").and_then(|v| v.as_str()) {
            let version = stdout.trim().to_string();
            phase.details.insert("version".to_string(), version.into());
        }
        phase
    }

    async fn npm_install(&self, provider: &dyn SandboxProvider, sandbox_id: &str) -> PhaseResult {
        if let Err(e) =
            write_file(provider, sandbox_id, PACKAGE_JSON_PATH, PACKAGE_JSON.as_bytes()).await
        {
            let mut phase = PhaseRecorder::start("npm_install");
            phase.tool_calls(2);
            phase.friction(e.to_string());
            phase.probe("npm", false);
            return phase.finish(false);
        }

        check_command(
            provider,
            sandbox_id,
            CommandCheck {
                phase: "npm_install",
                capability: "npm",
                command: "cd /tmp/npm-test && npm install 2>&1",
                timeout: Duration::from_secs(60),
                tool_calls: 2,
                stdout_limit: Some(BUILD_OUTPUT_LIMIT),
            },
            |out| out.is_success(),
        )
        .await
    }
}

#[async_trait]
impl TestSuite for EnvironmentSuite {
    fn name(&self) -> &str {
        "environment"
    }

    fn description(&self) -> &str {
        "Node.js setup, npm install, project clone, multi-step builds, venv"
    }

    async fn run(
        &self,
        provider: &dyn SandboxProvider,
        sandbox_id: &str,
    ) -> Result<Vec<PhaseResult>, SuiteError> {
        let node = self.node_available(provider, sandbox_id).await;
        let npm = self.npm_install(provider, sandbox_id).await;

        let clone = check_command(
            provider,
            sandbox_id,
            CommandCheck {
                phase: "project_clone",
                capability: "project_clone",
                command: "git clone --depth 1 https://github.com/expressjs/express.git /tmp/express-test 2>&1",
                timeout: Duration::from_secs(30),
                tool_calls: 1,
                stdout_limit: Some(BUILD_OUTPUT_LIMIT),
            },
            |out| out.is_success(),
        )
        .await;

        // Depends on the checkout from project_clone.
        let build = check_command(
            provider,
            sandbox_id,
            CommandCheck {
                phase: "multi_step_build",
                capability: "multi_step_build",
                command: "cd /tmp/express-test && npm install 2>&1 | tail -5 && npm test 2>&1 | head -20",
                timeout: Duration::from_secs(120),
                tool_calls: 1,
                stdout_limit: Some(BUILD_OUTPUT_LIMIT),
            },
            |out| out.is_success() || out.stdout.to_lowercase().contains("passing"),
        )
        .await;

        let venv = check_command(
            provider,
            sandbox_id,
            CommandCheck {
                phase: "python_venv",
                capability: "python_venv",
                command: "python3 -m venv /tmp/test-venv && /tmp/test-venv/bin/pip install flask -q 2>&1 && /tmp/test-venv/bin/python -c \"import flask; print(flask.__version__)\"",
                timeout: Duration::from_secs(60),
                tool_calls: 1,
                stdout_limit: None,
            },
            |out| out.is_success(),
        )
        .await;

        Ok(vec![node, npm, clone, build, venv])
    }
}
