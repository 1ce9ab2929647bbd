//! Basic suite: hello-world execution and a file round trip.

use async_trait::async_trait;
use serde_json::json;

use crate::error::SuiteError;
use crate::provider::{SandboxProvider, DEFAULT_EXEC_TIMEOUT};

use super::{PhaseRecorder, PhaseResult, TestSuite};

const HELLO_MARKER: &str = "Hello from sandbox-bench!";
const TEST_FILE_PATH: &str = "/tmp/sandbox-bench-test.txt";
const TEST_FILE_CONTENT: &str = "sandbox-bench test file content";

/// Hello-world execution and file read/write.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicSuite;

impl BasicSuite {
    async fn execute_hello(&self, provider: &dyn SandboxProvider, sandbox_id: &str) -> PhaseResult {
        let mut phase = PhaseRecorder::start("execute_hello");
        let code = format!("print('{HELLO_MARKER}')");

        let result = tokio::time::timeout(
            DEFAULT_EXEC_TIMEOUT,
            provider.execute(sandbox_id, &code, "python", DEFAULT_EXEC_TIMEOUT),
        )
        .await;

        match result {
            Ok(Ok(output)) => {
                phase.tool_call();
                phase.detail("stdout", output.stdout.clone());
                phase.detail("stderr", output.stderr.clone());
                phase.detail("exit_code", json!(output.exit_code));

                if !output.is_success() {
                    phase.friction(format!("Execute returned non-zero: {}", output.exit_code));
                }
                let printed = output.stdout.contains(HELLO_MARKER);
                if !printed {
                    phase.friction(format!("Unexpected output: {}", output.stdout));
                }
                phase.finish(output.is_success() && printed)
            }
            Ok(Err(e)) => {
                phase.error(format!("Execute failed: {e}"));
                phase.finish(false)
            }
            Err(_) => {
                phase.error(format!(
                    "Execute failed: timed out after {DEFAULT_EXEC_TIMEOUT:?}"
                ));
                phase.finish(false)
            }
        }
    }

    async fn file_io(&self, provider: &dyn SandboxProvider, sandbox_id: &str) -> PhaseResult {
        let mut phase = PhaseRecorder::start("file_io");

        let round_trip = async {
            provider
                .write_file(sandbox_id, TEST_FILE_PATH, TEST_FILE_CONTENT.as_bytes())
                .await?;
            provider.read_file(sandbox_id, TEST_FILE_PATH).await
        };

        let (calls, result) = match tokio::time::timeout(DEFAULT_EXEC_TIMEOUT, round_trip).await {
            Ok(Ok(content)) => (2, Ok(content)),
            Ok(Err(e)) => (1, Err(e.to_string())),
            Err(_) => (1, Err(format!("timed out after {DEFAULT_EXEC_TIMEOUT:?}"))),
        };
        phase.tool_calls(calls);

        match result {
            Ok(content) if content == TEST_FILE_CONTENT.as_bytes() => phase.finish(true),
            Ok(content) => {
                phase.friction(format!(
                    "File content mismatch: {}",
                    String::from_utf8_lossy(&content)
                ));
                phase.finish(false)
            }
            Err(message) => {
                phase.add_friction(1);
                phase.error(format!("File I/O failed: {message}"));
                phase.finish(false)
            }
        }
    }
}

#[async_trait]
impl TestSuite for BasicSuite {
    fn name(&self) -> &str {
        "basic"
    }

    fn description(&self) -> &str {
        "Hello-world execution and file read/write"
    }

    async fn run(
        &self,
        provider: &dyn SandboxProvider,
        sandbox_id: &str,
    ) -> Result<Vec<PhaseResult>, SuiteError> {
        Ok(vec![
            self.execute_hello(provider, sandbox_id).await,
            self.file_io(provider, sandbox_id).await,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::suites::testing::ScriptedProvider;

    #[tokio::test]
    async fn test_basic_suite_happy_path() {
        let provider = ScriptedProvider::new().on("print(", "Hello from sandbox-bench!\n", 0);
        let phases = BasicSuite.run(&provider, "sb-1").await.unwrap();

        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].name, "execute_hello");
        assert!(phases[0].success);
        assert_eq!(phases[0].tool_calls, 1);
        assert_eq!(phases[1].name, "file_io");
        assert!(phases[1].success);
        assert_eq!(phases[1].tool_calls, 2);
        assert!(phases.iter().all(|p| p.capability.is_none()));
    }

    #[tokio::test]
    async fn test_execute_hello_wrong_output_is_friction() {
        let provider = ScriptedProvider::new().on("print(", "something else", 1);
        let phases = BasicSuite.run(&provider, "sb-1").await.unwrap();

        let hello = &phases[0];
        assert!(!hello.success);
        assert_eq!(hello.friction_points, 2);
        assert_eq!(hello.errors, 0);
    }

    #[tokio::test]
    async fn test_execute_hello_provider_error() {
        let provider = ScriptedProvider::new()
            .on_error("print(", ProviderError::Execution("no python".into()));
        let phases = BasicSuite.run(&provider, "sb-1").await.unwrap();

        let hello = &phases[0];
        assert!(!hello.success);
        assert_eq!(hello.errors, 1);
        assert_eq!(hello.tool_calls, 0);
        assert!(hello.error_messages[0].contains("no python"));
    }

    #[tokio::test]
    async fn test_file_io_failure() {
        let mut provider = ScriptedProvider::new().on("print(", "Hello from sandbox-bench!", 0);
        provider.fail_files = true;
        let phases = BasicSuite.run(&provider, "sb-1").await.unwrap();

        let io = &phases[1];
        assert!(!io.success);
        assert_eq!(io.errors, 1);
        assert_eq!(io.friction_points, 1);
    }
}
