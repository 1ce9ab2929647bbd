//! SWE-bench style suite: network, pip, git and pytest.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SuiteError;
use crate::provider::SandboxProvider;

use super::{check_command, write_file, CommandCheck, PhaseRecorder, PhaseResult, TestSuite};

const PYTEST_FILE: &str = "/tmp/test_bench.py";
const PYTEST_SOURCE: &str = "def test_add():\n    assert 1 + 1 == 2\n\ndef test_string():\n    assert 'hello'.upper() == 'HELLO'\n";

/// Network access, pip install, git clone, pytest execution.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweSuite;

impl SweSuite {
    async fn pytest_run(&self, provider: &dyn SandboxProvider, sandbox_id: &str) -> PhaseResult {
        if let Err(e) =
            write_file(provider, sandbox_id, PYTEST_FILE, PYTEST_SOURCE.as_bytes()).await
        {
            let mut phase = PhaseRecorder::start("pytest_run");
            phase.tool_calls(2);
            phase.friction(e.to_string());
            phase.probe("pytest", false);
            return phase.finish(false);
        }

        check_command(
            provider,
            sandbox_id,
            CommandCheck {
                phase: "pytest_run",
                capability: "pytest",
                command: "pip install pytest -q 2>/dev/null; python3 -m pytest /tmp/test_bench.py -v 2>&1",
                timeout: Duration::from_secs(60),
                tool_calls: 2,
                stdout_limit: None,
            },
            |out| out.is_success() && out.stdout.contains("passed"),
        )
        .await
    }
}

#[async_trait]
impl TestSuite for SweSuite {
    fn name(&self) -> &str {
        "swe"
    }

    fn description(&self) -> &str {
        "Network access, pip install, git clone, pytest execution"
    }

    async fn run(
        &self,
        provider: &dyn SandboxProvider,
        sandbox_id: &str,
    ) -> Result<Vec<PhaseResult>, SuiteError> {
        let network = check_command(
            provider,
            sandbox_id,
            CommandCheck {
                phase: "network_access",
                capability: "network_access",
                command: "python3 -c \"import urllib.request; print(urllib.request.urlopen('https://httpbin.org/get').status)\"",
                timeout: Duration::from_secs(15),
                tool_calls: 1,
                stdout_limit: None,
            },
            |out| out.is_success() && out.stdout.trim().contains("200"),
        )
        .await;

        let pip = check_command(
            provider,
            sandbox_id,
            CommandCheck {
                phase: "pip_install",
                capability: "pip_install",
                command: "pip install requests==2.31.0 -q && python3 -c \"import requests; print(requests.__version__)\"",
                timeout: Duration::from_secs(60),
                tool_calls: 1,
                stdout_limit: None,
            },
            |out| out.is_success() && out.stdout.contains("2.31.0"),
        )
        .await;

        let git = check_command(
            provider,
            sandbox_id,
            CommandCheck {
                phase: "git_clone",
                capability: "git_clone",
                command: "git clone --depth 1 https://github.com/pallets/flask.git /tmp/flask-test 2>&1 && test -d /tmp/flask-test/.git",
                timeout: Duration::from_secs(30),
                tool_calls: 1,
                stdout_limit: None,
            },
            |out| out.is_success(),
        )
        .await;

        let pytest = self.pytest_run(provider, sandbox_id).await;
        Ok(vec![network, pip, git, pytest])
    }
}
