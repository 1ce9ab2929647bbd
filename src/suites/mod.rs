//! Test suite framework.
//!
//! A suite is an ordered, named collection of phases run against one
//! already-created sandbox. Suites are looked up through a [`SuiteRegistry`]
//! that also expands composite aliases such as `full`.

pub mod basic;
pub mod competitive;
pub mod environment;
pub mod performance;
pub mod phase;
pub mod swe;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{ProviderError, RegistryError, SuiteError};
use crate::provider::{ExecOutput, SandboxProvider};

pub use basic::BasicSuite;
pub use competitive::CompetitiveSuite;
pub use environment::EnvironmentSuite;
pub use performance::PerformanceSuite;
pub use phase::{CapabilityProbe, PhaseRecorder, PhaseResult};
pub use swe::SweSuite;

/// Alias that expands to every built-in suite.
pub const FULL_ALIAS: &str = "full";

/// Extra time granted to a provider beyond the timeout it was handed.
const DEADLINE_GRACE: Duration = Duration::from_secs(2);

/// Deadline for a single file transfer inside a suite.
pub(crate) const FILE_OP_TIMEOUT: Duration = Duration::from_secs(60);

/// Deadline for creating or destroying a secondary sandbox.
pub(crate) const LIFECYCLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Trait implemented by every test suite.
#[async_trait]
pub trait TestSuite: Send + Sync {
    /// Registry name of the suite.
    fn name(&self) -> &str;

    /// One-line description.
    fn description(&self) -> &str;

    /// Runs every phase in order against `sandbox_id`.
    ///
    /// Failures of individual phases are reported as failing
    /// [`PhaseResult`]s; an `Err` means the suite as a whole crashed.
    async fn run(
        &self,
        provider: &dyn SandboxProvider,
        sandbox_id: &str,
    ) -> Result<Vec<PhaseResult>, SuiteError>;
}

/// Ordered phase results from one suite invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteOutcome {
    pub suite: String,
    pub phases: Vec<PhaseResult>,
}

impl SuiteOutcome {
    pub fn new(suite: impl Into<String>, phases: Vec<PhaseResult>) -> Self {
        Self {
            suite: suite.into(),
            phases,
        }
    }

    /// Looks up a phase by name.
    pub fn phase(&self, name: &str) -> Option<&PhaseResult> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// True if every phase succeeded.
    pub fn all_passed(&self) -> bool {
        self.phases.iter().all(|p| p.success)
    }
}

/// Constructor for a suite instance.
pub type SuiteConstructor = Arc<dyn Fn() -> Box<dyn TestSuite> + Send + Sync>;

/// Name → constructor map for suites, plus composite aliases.
#[derive(Clone, Default)]
pub struct SuiteRegistry {
    constructors: BTreeMap<String, SuiteConstructor>,
    aliases: BTreeMap<String, Vec<String>>,
}

impl SuiteRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in suites and the `full` alias.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, SuiteConstructor); 5] = [
            ("basic", Arc::new(|| Box::new(BasicSuite) as Box<dyn TestSuite>)),
            (
                "competitive",
                Arc::new(|| Box::new(CompetitiveSuite) as Box<dyn TestSuite>),
            ),
            ("swe", Arc::new(|| Box::new(SweSuite) as Box<dyn TestSuite>)),
            (
                "environment",
                Arc::new(|| Box::new(EnvironmentSuite) as Box<dyn TestSuite>),
            ),
            (
                "performance",
                Arc::new(|| Box::new(PerformanceSuite) as Box<dyn TestSuite>),
            ),
        ];

        let mut order = Vec::with_capacity(builtins.len());
        for (name, constructor) in builtins {
            order.push(name.to_string());
            registry.constructors.insert(name.to_string(), constructor);
        }
        registry.aliases.insert(FULL_ALIAS.to_string(), order);
        registry
    }

    /// Registers a suite constructor under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> Result<(), RegistryError>
    where
        F: Fn() -> Box<dyn TestSuite> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.constructors.contains_key(&name) || self.aliases.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        self.constructors.insert(name, Arc::new(constructor));
        Ok(())
    }

    /// Registers an alias expanding to an ordered list of concrete suites.
    pub fn alias(
        &mut self,
        name: impl Into<String>,
        members: Vec<String>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.constructors.contains_key(&name) || self.aliases.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        if let Some(unknown) = members.iter().find(|m| !self.constructors.contains_key(*m)) {
            return Err(self.unknown(unknown));
        }
        self.aliases.insert(name, members);
        Ok(())
    }

    /// Builds a fresh instance of the named suite.
    pub fn create(&self, name: &str) -> Result<Box<dyn TestSuite>, RegistryError> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| self.unknown(name))
    }

    /// Expands aliases into concrete suite names.
    ///
    /// Duplicates are dropped, keeping the first occurrence.
    pub fn expand(&self, names: &[String]) -> Result<Vec<String>, RegistryError> {
        fn push_unique(out: &mut Vec<String>, name: &str) {
            if !out.iter().any(|n| n == name) {
                out.push(name.to_string());
            }
        }

        let mut expanded = Vec::new();
        for name in names {
            if let Some(members) = self.aliases.get(name) {
                for member in members {
                    push_unique(&mut expanded, member);
                }
            } else if self.constructors.contains_key(name) {
                push_unique(&mut expanded, name);
            } else {
                return Err(self.unknown(name));
            }
        }
        Ok(expanded)
    }

    /// Concrete suite names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Alias table.
    pub fn aliases(&self) -> &BTreeMap<String, Vec<String>> {
        &self.aliases
    }

    /// `(name, description)` for every concrete suite.
    pub fn describe(&self) -> Vec<(String, String)> {
        self.constructors
            .iter()
            .map(|(name, constructor)| (name.clone(), constructor().description().to_string()))
            .collect()
    }

    fn unknown(&self, name: &str) -> RegistryError {
        let mut available = self.names();
        available.extend(self.aliases.keys().cloned());
        RegistryError::UnknownSuite {
            name: name.to_string(),
            available: available.join(", "),
        }
    }
}

impl std::fmt::Debug for SuiteRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuiteRegistry")
            .field("suites", &self.names())
            .field("aliases", &self.aliases)
            .finish()
    }
}

/// Applies a deadline to one provider call. Expiry becomes
/// [`ProviderError::Timeout`] naming `operation`.
pub(crate) async fn bounded_call<T, F>(
    operation: &str,
    limit: Duration,
    call: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::timeout(operation, limit)),
    }
}

/// Runs a shell command with a hard deadline on top of the provider's own
/// timeout handling.
pub(crate) async fn run_command(
    provider: &dyn SandboxProvider,
    sandbox_id: &str,
    command: &str,
    timeout: Duration,
) -> Result<ExecOutput, ProviderError> {
    debug!(provider = %provider.name(), command = %command, "Executing command");
    bounded_call(
        "execute_command",
        timeout + DEADLINE_GRACE,
        provider.execute_command(sandbox_id, command, timeout),
    )
    .await
}

/// Writes a file under [`FILE_OP_TIMEOUT`].
pub(crate) async fn write_file(
    provider: &dyn SandboxProvider,
    sandbox_id: &str,
    path: &str,
    content: &[u8],
) -> Result<(), ProviderError> {
    bounded_call(
        "write_file",
        FILE_OP_TIMEOUT,
        provider.write_file(sandbox_id, path, content),
    )
    .await
}

/// Reads a file under [`FILE_OP_TIMEOUT`].
pub(crate) async fn read_file(
    provider: &dyn SandboxProvider,
    sandbox_id: &str,
    path: &str,
) -> Result<Vec<u8>, ProviderError> {
    bounded_call("read_file", FILE_OP_TIMEOUT, provider.read_file(sandbox_id, path)).await
}

/// Description of a single-command capability check.
pub(crate) struct CommandCheck<'a> {
    pub phase: &'a str,
    pub capability: &'a str,
    pub command: &'a str,
    pub timeout: Duration,
    /// Tool calls charged to the phase, including any setup writes.
    pub tool_calls: u32,
    /// Bytes of stdout kept in the phase details; `None` keeps all of it.
    pub stdout_limit: Option<usize>,
}

/// Runs a capability check: a command whose output decides support.
///
/// Failure of the check is one friction point; a provider error is also
/// one friction point with the message attached.
pub(crate) async fn check_command<F>(
    provider: &dyn SandboxProvider,
    sandbox_id: &str,
    check: CommandCheck<'_>,
    passed: F,
) -> PhaseResult
where
    F: Fn(&ExecOutput) -> bool,
{
    let mut recorder = PhaseRecorder::start(check.phase);
    recorder.tool_calls(check.tool_calls);

    match run_command(provider, sandbox_id, check.command, check.timeout).await {
        Ok(output) => {
            let success = passed(&output);
            if !success {
                recorder.add_friction(1);
            }
            recorder.probe(check.capability, success);
            record_output(&mut recorder, &output, check.stdout_limit);
            recorder.finish(success)
        }
        Err(e) => {
            recorder.friction(e.to_string());
            recorder.probe(check.capability, false);
            recorder.finish(false)
        }
    }
}

/// Stores stdout, stderr and exit code as phase details.
pub(crate) fn record_output(
    recorder: &mut PhaseRecorder,
    output: &ExecOutput,
    stdout_limit: Option<usize>,
) {
    let stdout = match stdout_limit {
        Some(limit) => truncate(&output.stdout, limit),
        None => output.stdout.clone(),
    };
    recorder.detail("stdout", stdout);
    recorder.detail("stderr", output.stderr.clone());
    recorder.detail("exit_code", json!(output.exit_code));
}

/// Truncates on a char boundary at or below `limit` bytes.
pub(crate) fn truncate(s: &str, limit: usize) -> String {
    if s.len() <= limit {
        return s.to_string();
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedProvider;
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_builtin_suites() {
        let registry = SuiteRegistry::builtin();
        assert_eq!(
            registry.names(),
            names(&["basic", "competitive", "environment", "performance", "swe"])
        );
        for name in registry.names() {
            let suite = registry.create(&name).unwrap();
            assert_eq!(suite.name(), name);
            assert!(!suite.description().is_empty());
        }
    }

    #[test]
    fn test_expand_full_alias() {
        let registry = SuiteRegistry::builtin();
        let expanded = registry.expand(&names(&["full"])).unwrap();
        assert_eq!(
            expanded,
            names(&["basic", "competitive", "swe", "environment", "performance"])
        );
    }

    #[test]
    fn test_expand_dedupes_keeping_first_occurrence() {
        let registry = SuiteRegistry::builtin();
        let expanded = registry
            .expand(&names(&["swe", "basic", "full", "swe"]))
            .unwrap();
        assert_eq!(
            expanded,
            names(&["swe", "basic", "competitive", "environment", "performance"])
        );
    }

    #[test]
    fn test_expand_unknown_suite() {
        let registry = SuiteRegistry::builtin();
        let err = registry.expand(&names(&["basic", "gpu"])).unwrap_err();
        match err {
            RegistryError::UnknownSuite { name, available } => {
                assert_eq!(name, "gpu");
                assert!(available.contains("basic"));
                assert!(available.contains("full"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = SuiteRegistry::builtin();
        let err = registry
            .register("basic", || Box::new(BasicSuite) as Box<dyn TestSuite>)
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(_)));

        let err = registry.alias("quick", names(&["basic", "nope"])).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownSuite { .. }));

        registry.alias("quick", names(&["basic"])).unwrap();
        assert_eq!(registry.expand(&names(&["quick"])).unwrap(), names(&["basic"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_call_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(90)).await;
            Ok::<_, ProviderError>(())
        };
        let err = bounded_call("write_file", FILE_OP_TIMEOUT, slow)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "write_file timed out after 60s");

        let fast = async { Ok::<_, ProviderError>(7) };
        assert_eq!(bounded_call("read_file", FILE_OP_TIMEOUT, fast).await.unwrap(), 7);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 3), "hel");
        assert_eq!(truncate("héllo", 2), "h");
    }

    #[tokio::test]
    async fn test_check_command_records_friction_on_failure() {
        let provider = ScriptedProvider::new().on("node --version", "", 127);
        let phase = check_command(
            &provider,
            "sb-1",
            CommandCheck {
                phase: "node_available",
                capability: "nodejs",
                command: "node --version",
                timeout: Duration::from_secs(5),
                tool_calls: 1,
                stdout_limit: None,
            },
            |out| out.is_success(),
        )
        .await;

        assert!(!phase.success);
        assert_eq!(phase.friction_points, 1);
        assert_eq!(phase.tool_calls, 1);
        assert!(!phase.capability.unwrap().supported);
    }

    #[tokio::test]
    async fn test_check_command_provider_error() {
        let provider = ScriptedProvider::new()
            .on_error("git clone", ProviderError::Execution("network down".into()));
        let phase = check_command(
            &provider,
            "sb-1",
            CommandCheck {
                phase: "git_clone",
                capability: "git_clone",
                command: "git clone x",
                timeout: Duration::from_secs(5),
                tool_calls: 1,
                stdout_limit: None,
            },
            |out| out.is_success(),
        )
        .await;

        assert!(!phase.success);
        assert_eq!(phase.friction_points, 1);
        assert!(phase.error_messages[0].contains("network down"));
    }
}
