//! Competitive-programming suite: stdin piping, C/C++ compilation, time
//! limits and the Python toolchain.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::json;
use tokio::time::Instant;

use crate::error::SuiteError;
use crate::provider::{SandboxProvider, DEFAULT_EXEC_TIMEOUT};

use super::{
    check_command, record_output, run_command, write_file, CommandCheck, PhaseRecorder,
    PhaseResult, TestSuite,
};

/// Timeout handed to the provider for the sleeping script.
const EXEC_TIMEOUT_LIMIT: Duration = Duration::from_secs(3);

/// A command finishing faster than this did not run to completion.
const EXEC_TIMEOUT_WINDOW: Duration = Duration::from_secs(8);

/// How long to wait for the provider to answer at all. Outlasts the window
/// so only the provider's own answer can count as enforcement.
const EXEC_TIMEOUT_DEADLINE: Duration = Duration::from_secs(15);

const C_SOURCE: &str = "#include <stdio.h>\nint main() { printf(\"hello-c\\n\"); return 0; }";
const CPP_SOURCE: &str =
    "#include <iostream>\nint main() { std::cout << \"hello-cpp\" << std::endl; return 0; }";

/// Extracts "3.11.4" from "Python 3.11.4".
fn parse_python_version(text: &str) -> Option<String> {
    let re = Regex::new(r"Python (\d+\.\d+(?:\.\d+)?)").ok()?;
    re.captures(text).map(|caps| caps[1].to_string())
}

/// Stdin piping, GCC/G++ compilation, exec timeout, Python version.
#[derive(Debug, Default, Clone, Copy)]
pub struct CompetitiveSuite;

impl CompetitiveSuite {
    #[allow(clippy::too_many_arguments)]
    async fn compile_and_run(
        &self,
        provider: &dyn SandboxProvider,
        sandbox_id: &str,
        phase_name: &str,
        capability: &str,
        source: (&str, &str),
        command: &str,
        marker: &str,
    ) -> PhaseResult {
        let mut phase = PhaseRecorder::start(phase_name);
        phase.tool_calls(2);

        let (path, code) = source;
        if let Err(e) = write_file(provider, sandbox_id, path, code.as_bytes()).await {
            phase.friction(e.to_string());
            phase.probe(capability, false);
            return phase.finish(false);
        }

        match run_command(provider, sandbox_id, command, DEFAULT_EXEC_TIMEOUT).await {
            Ok(output) => {
                let success = output.is_success() && output.stdout.contains(marker);
                if !success {
                    phase.add_friction(1);
                }
                phase.probe(capability, success);
                record_output(&mut phase, &output, None);
                phase.finish(success)
            }
            Err(e) => {
                phase.friction(e.to_string());
                phase.probe(capability, false);
                phase.finish(false)
            }
        }
    }

    async fn exec_timeout(&self, provider: &dyn SandboxProvider, sandbox_id: &str) -> PhaseResult {
        let mut phase = PhaseRecorder::start("exec_timeout");
        phase.tool_call();
        let command = "python3 -c \"import time; time.sleep(10); print('done')\"";

        let started = Instant::now();
        let result = tokio::time::timeout(
            EXEC_TIMEOUT_DEADLINE,
            provider.execute_command(sandbox_id, command, EXEC_TIMEOUT_LIMIT),
        )
        .await;
        let elapsed = started.elapsed();
        let within_window = elapsed < EXEC_TIMEOUT_WINDOW;

        let enforced = match &result {
            Ok(Ok(output)) => {
                record_output(&mut phase, output, None);
                within_window && (!output.is_success() || !output.stdout.contains("done"))
            }
            Ok(Err(e)) => {
                phase.detail("exception", e.to_string());
                if !within_window {
                    phase.note(e.to_string());
                }
                within_window
            }
            Err(_) => {
                let message = format!("no response within {EXEC_TIMEOUT_DEADLINE:?}");
                phase.detail("exception", message.clone());
                phase.note(message);
                false
            }
        };

        phase.detail("elapsed", json!(elapsed.as_secs_f64()));
        if !enforced {
            phase.add_friction(1);
        }
        phase.probe("exec_timeout", enforced);
        phase.finish_with_duration(enforced, elapsed)
    }

    async fn python_version(&self, provider: &dyn SandboxProvider, sandbox_id: &str) -> PhaseResult {
        let mut phase = PhaseRecorder::start("python_version");
        phase.tool_call();

        match run_command(provider, sandbox_id, "python3 --version", DEFAULT_EXEC_TIMEOUT).await {
            Ok(output) => {
                // Older interpreters print the version on stderr.
                let version = output.combined();
                let success = output.is_success() && version.contains("Python");
                if let Some(parsed) = parse_python_version(&version) {
                    phase.detail("python_version", parsed);
                }
                phase.detail("version", version);
                phase.probe("python3", success);
                phase.finish(success)
            }
            Err(e) => {
                phase.friction(e.to_string());
                phase.probe("python3", false);
                phase.finish(false)
            }
        }
    }
}

#[async_trait]
impl TestSuite for CompetitiveSuite {
    fn name(&self) -> &str {
        "competitive"
    }

    fn description(&self) -> &str {
        "Stdin piping, GCC/G++ compilation, exec timeout, Python version"
    }

    async fn run(
        &self,
        provider: &dyn SandboxProvider,
        sandbox_id: &str,
    ) -> Result<Vec<PhaseResult>, SuiteError> {
        let mut phases = Vec::with_capacity(5);

        phases.push(
            check_command(
                provider,
                sandbox_id,
                CommandCheck {
                    phase: "stdin_piping",
                    capability: "stdin_piping",
                    command: "echo '3 5' | python3 -c \"a,b=map(int,input().split()); print(a+b)\"",
                    timeout: DEFAULT_EXEC_TIMEOUT,
                    tool_calls: 1,
                    stdout_limit: None,
                },
                |out| out.is_success() && out.stdout.trim().contains('8'),
            )
            .await,
        );

        phases.push(
            self.compile_and_run(
                provider,
                sandbox_id,
                "gcc_compilation",
                "gcc",
                ("/tmp/hello.c", C_SOURCE),
                "gcc /tmp/hello.c -o /tmp/hello_c && /tmp/hello_c",
                "hello-c",
            )
            .await,
        );

        phases.push(
            self.compile_and_run(
                provider,
                sandbox_id,
                "cpp_compilation",
                "gpp",
                ("/tmp/hello.cpp", CPP_SOURCE),
                "g++ /tmp/hello.cpp -o /tmp/hello_cpp && /tmp/hello_cpp",
                "hello-cpp",
            )
            .await,
        );

        phases.push(self.exec_timeout(provider, sandbox_id).await);
        phases.push(self.python_version(provider, sandbox_id).await);
        Ok(phases)
    }
}
