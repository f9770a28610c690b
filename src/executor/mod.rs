//! Executor backend contract — the seat that actually touches the repo.
//!
//! Mirrors an `agent::AgentAdapter` trait and `agent::SpawnConfig` shape:
//! a process-spawning adapter interface kept
//! separate from the Manager's reasoning interface, keeping "who decides"
//! apart from "who does".

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ExecutorError;
use crate::mission::Artifact;

/// Previously produced artifacts are truncated to this many content bytes
/// before being handed to an Executor — the truncation is the
/// orchestrator's responsibility, not the backend's.
pub const PREVIOUS_ARTIFACT_PREFIX_LEN: usize = 500;

/// A previously produced artifact, trimmed for inclusion in the next
/// iteration's context rather than replayed in full.
#[derive(Debug, Clone)]
pub struct PreviousArtifact {
    pub path: String,
    pub content_prefix: String,
}

/// Everything an Executor needs to carry out one planned step.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub session_id: String,
    pub repository: PathBuf,
    pub instructions: String,
    pub iteration: u64,
    pub previous_artifacts: Vec<PreviousArtifact>,
}

impl ExecutionContext {
    /// Truncate each artifact's content to [`PREVIOUS_ARTIFACT_PREFIX_LEN`]
    /// bytes (at a char boundary) for inclusion as `previous_artifacts`.
    pub fn truncate_artifacts(artifacts: &[Artifact]) -> Vec<PreviousArtifact> {
        artifacts
            .iter()
            .map(|a| {
                let mut end = a.content.len().min(PREVIOUS_ARTIFACT_PREFIX_LEN);
                while end > 0 && !a.content.is_char_boundary(end) {
                    end -= 1;
                }
                PreviousArtifact { path: a.path.clone(), content_prefix: a.content[..end].to_string() }
            })
            .collect()
    }
}

/// Token accounting reported back by a backend, when it tracks one.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// The outcome of one Executor run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    pub artifacts: Vec<Artifact>,
    /// Set when the backend process exited or otherwise ended its own
    /// session mid-task (the executor may end unexpectedly).
    pub session_ended: bool,
    pub token_usage: TokenUsage,
    pub error: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// The execution backend: larger, slower, does the actual work.
#[async_trait]
pub trait Executor: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, context: &ExecutionContext) -> Result<ExecutionResult, ExecutorError>;

    /// Best-effort cancellation of an in-flight run. Default is a no-op for
    /// backends with nothing to signal.
    async fn cancel(&self, _session_id: &str) -> Result<(), ExecutorError> {
        Ok(())
    }

    /// Called once, before a session's first iteration. Default is a no-op
    /// for backends with no session concept of their own.
    async fn start_session(&self, _session_id: &str) -> Result<(), ExecutorError> {
        Ok(())
    }

    /// Called once the orchestrator is done with this session, win or lose.
    async fn end_session(&self) -> Result<(), ExecutorError> {
        Ok(())
    }

    /// Checked once before the first iteration; a backend returning `false`
    /// aborts the run with `ExecutorUnavailable` before any work starts.
    async fn validate_environment(&self) -> Result<bool, ExecutorError> {
        Ok(true)
    }
}

/// An in-process demo Executor used when no real backend is configured. It
/// never touches the filesystem: it reports success and emits the planned
/// instructions back as its output, with no artifacts.
///
/// Same `agent::AgentAdapter::spawn_config` shape as a minimal
/// always-available fallback registered by name, same pattern as
/// [`crate::manager::EchoManager`].
pub struct EchoExecutor {
    name: String,
}

impl EchoExecutor {
    pub fn new() -> Self {
        Self { name: "echo-executor".to_string() }
    }
}

impl Default for EchoExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for EchoExecutor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, context: &ExecutionContext) -> Result<ExecutionResult, ExecutorError> {
        Ok(ExecutionResult {
            success: true,
            output: format!("echo-executor: {}", context.instructions),
            artifacts: Vec::new(),
            session_ended: false,
            token_usage: TokenUsage::default(),
            error: None,
            metadata: HashMap::new(),
        })
    }
}

/// A scripted Executor for tests: returns a fixed sequence of results, one
/// per call, then repeats the last result. Same shape as the `agent`
/// test doubles used by `supervisor` unit tests.
#[cfg(any(test, feature = "test-support"))]
pub struct ScriptedExecutor {
    results: std::sync::Mutex<Vec<ExecutionResult>>,
}

#[cfg(any(test, feature = "test-support"))]
impl ScriptedExecutor {
    pub fn new(results: Vec<ExecutionResult>) -> Self {
        Self { results: std::sync::Mutex::new(results) }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl Executor for ScriptedExecutor {
    fn name(&self) -> &str {
        "scripted-executor"
    }

    async fn execute(&self, _context: &ExecutionContext) -> Result<ExecutionResult, ExecutorError> {
        let mut results = self.results.lock().unwrap();
        if results.len() > 1 {
            Ok(results.remove(0))
        } else {
            results.last().cloned().ok_or(ExecutorError::Unavailable)
        }
    }
}

/// Look up an Executor backend by name. Returns `None` for unrecognized names.
pub fn executor_from_name(name: &str) -> Option<Box<dyn Executor>> {
    match name {
        "echo" | "echo-executor" => Some(Box::new(EchoExecutor::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ExecutionContext {
        ExecutionContext {
            session_id: "s1".to_string(),
            repository: PathBuf::from("/repo"),
            instructions: "do the thing".to_string(),
            iteration: 1,
            previous_artifacts: Vec::new(),
        }
    }

    #[test]
    fn truncate_artifacts_trims_content_to_the_prefix_length() {
        use crate::mission::{Artifact, ArtifactKind};
        let long = "x".repeat(PREVIOUS_ARTIFACT_PREFIX_LEN + 50);
        let artifact = Artifact {
            id: "a1".to_string(),
            kind: ArtifactKind::Code,
            path: "src/lib.rs".to_string(),
            content: long.clone(),
            version: 1,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            checksum: None,
        };
        let truncated = ExecutionContext::truncate_artifacts(&[artifact]);
        assert_eq!(truncated[0].content_prefix.len(), PREVIOUS_ARTIFACT_PREFIX_LEN);
        assert_ne!(truncated[0].content_prefix, long);
    }

    #[tokio::test]
    async fn echo_executor_reports_success_and_echoes_instructions() {
        let executor = EchoExecutor::new();
        let result = executor.execute(&context()).await.unwrap();
        assert!(result.success);
        assert!(result.output.contains("do the thing"));
        assert!(result.artifacts.is_empty());
    }

    #[tokio::test]
    async fn echo_executor_cancel_is_a_harmless_no_op() {
        let executor = EchoExecutor::new();
        executor.cancel("s1").await.unwrap();
    }

    #[tokio::test]
    async fn scripted_executor_returns_results_in_order_then_repeats_last() {
        let executor = ScriptedExecutor::new(vec![
            ExecutionResult { success: false, ..Default::default() },
            ExecutionResult { success: true, ..Default::default() },
        ]);
        let first = executor.execute(&context()).await.unwrap();
        let second = executor.execute(&context()).await.unwrap();
        let third = executor.execute(&context()).await.unwrap();
        assert!(!first.success);
        assert!(second.success);
        assert!(third.success);
    }

    #[test]
    fn lookup_by_name() {
        assert!(executor_from_name("echo").is_some());
        assert!(executor_from_name("echo-executor").is_some());
        assert!(executor_from_name("nonexistent").is_none());
    }
}
