//! Manager backend contract — the planning/validation seat.
//!
//! Four operations: analyze, plan, validate, recover. Trait shape and the
//! name-based lookup factory mirror an `agent::AgentAdapter` trait +
//! `agent::adapter_from_name` pattern: a small `Send + Sync` trait object
//! interface with a registry function
//! so the orchestrator never needs to know which concrete backend it's
//! talking to.

pub mod parse;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ManagerError;
use crate::mission::DoDCriterion;
use crate::session::SessionState;

/// A natural-language assessment of the current state, feeding `plan`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Analysis {
    pub status: String,
    pub blockers: Vec<String>,
    pub recommendations: Vec<String>,
    pub next_steps: Vec<String>,
    pub confidence: f64,
}

/// Decision on whether a criterion may now be marked complete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Validation {
    pub completed: bool,
    pub evidence: Option<String>,
    pub reason: Option<String>,
    pub confidence: f64,
}

/// A proposed retry course for a failed iteration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Recovery {
    pub can_recover: bool,
    pub strategy: Option<String>,
    pub recovery_action: Option<String>,
    pub reason: Option<String>,
}

/// The planning backend: small, cheap, reasoning-focused.
///
/// Prompt composition and response parsing are internal to each
/// implementation; the orchestrator only sees these four typed calls.
#[async_trait]
pub trait Manager: Send + Sync {
    /// Human-readable name (e.g. for logging which backend served a call).
    fn name(&self) -> &str;

    async fn analyze(
        &self,
        mission: &crate::mission::Mission,
        session: &SessionState,
        progress: crate::progress::Progress,
    ) -> Result<Analysis, ManagerError>;

    async fn plan(
        &self,
        analysis: &Analysis,
        next_criterion: &DoDCriterion,
        session: &SessionState,
    ) -> Result<String, ManagerError>;

    async fn validate(
        &self,
        criterion: &DoDCriterion,
        execution_result: &crate::executor::ExecutionResult,
        session: &SessionState,
    ) -> Result<Validation, ManagerError>;

    async fn recover(
        &self,
        error: &crate::session::SessionError,
        session: &SessionState,
    ) -> Result<Recovery, ManagerError>;
}

/// An in-process demo Manager used by the CLI and integration tests when no
/// real backend is configured. It always recommends proceeding, plans by
/// echoing the criterion description, approves validation once the
/// executor reports success, and never recovers from a fatal error.
///
/// Same `adapter_from_name` factory shape: a minimal,
/// always-available fallback implementation registered by name.
pub struct EchoManager {
    name: String,
}

impl EchoManager {
    pub fn new() -> Self {
        Self { name: "echo-manager".to_string() }
    }
}

impl Default for EchoManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Manager for EchoManager {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(
        &self,
        _mission: &crate::mission::Mission,
        _session: &SessionState,
        progress: crate::progress::Progress,
    ) -> Result<Analysis, ManagerError> {
        // A real backend would hand back free-form prose; round the echoed
        // reply through the same tolerant parser those backends need, so
        // the demo path exercises it too.
        let draft = Analysis {
            status: format!("{} ({}% complete)", progress.phase_label, progress.percent),
            blockers: Vec::new(),
            recommendations: vec!["proceed with the next pending criterion".to_string()],
            next_steps: Vec::new(),
            confidence: 0.8,
        };
        let reply = serde_json::to_string(&draft)
            .map_err(|e| ManagerError::Protocol(format!("failed to encode demo reply: {e}")))?;
        parse::parse_loose(&reply)
    }

    async fn plan(
        &self,
        _analysis: &Analysis,
        next_criterion: &DoDCriterion,
        _session: &SessionState,
    ) -> Result<String, ManagerError> {
        Ok(next_criterion.description.clone())
    }

    async fn validate(
        &self,
        _criterion: &DoDCriterion,
        execution_result: &crate::executor::ExecutionResult,
        _session: &SessionState,
    ) -> Result<Validation, ManagerError> {
        let draft = Validation {
            completed: execution_result.success,
            evidence: Some(execution_result.output.clone()),
            reason: if execution_result.success {
                None
            } else {
                Some("executor did not report success".to_string())
            },
            confidence: if execution_result.success { 0.9 } else { 0.1 },
        };
        let reply = serde_json::to_string(&draft)
            .map_err(|e| ManagerError::Protocol(format!("failed to encode demo reply: {e}")))?;
        parse::parse_loose(&reply)
    }

    async fn recover(
        &self,
        _error: &crate::session::SessionError,
        _session: &SessionState,
    ) -> Result<Recovery, ManagerError> {
        let draft = Recovery {
            can_recover: false,
            strategy: None,
            recovery_action: None,
            reason: Some("echo-manager never recovers from a fatal error".to_string()),
        };
        let reply = serde_json::to_string(&draft)
            .map_err(|e| ManagerError::Protocol(format!("failed to encode demo reply: {e}")))?;
        Ok(parse::parse_loose_or_default(&reply))
    }
}

/// Look up a Manager backend by name. Returns `None` for unrecognized names.
pub fn manager_from_name(name: &str) -> Option<Box<dyn Manager>> {
    match name {
        "echo" | "echo-manager" => Some(Box::new(EchoManager::new())),
        _ => None,
    }
}
