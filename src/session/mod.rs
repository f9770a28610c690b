//! Session lifecycle: the per-run state machine and its durable record.

pub mod log;
pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::mission::Artifact;

/// Per-session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Initialization,
    Planning,
    Execution,
    Validation,
    ErrorRecovery,
    Completion,
}

impl Phase {
    /// Where a successful `VALIDATION` step returns to.
    pub fn after_validation(mission_complete: bool) -> Phase {
        if mission_complete { Phase::Completion } else { Phase::Planning }
    }
}

/// One recorded failure during a session, kept for post-mortem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionError {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub message: String,
    pub stack: Option<String>,
    pub resolved: bool,
}

impl SessionError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: format!("err-{}", Uuid::new_v4()),
            timestamp: Utc::now(),
            kind: kind.into(),
            message: message.into(),
            stack: None,
            resolved: false,
        }
    }
}

/// The durable record of a single stateful attempt to fulfill a mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub mission_id: String,
    pub repository: std::path::PathBuf,
    /// Short opaque tag identifying the executor instance driving this session.
    pub cc_instance_id: String,
    pub current_phase: Phase,
    pub completed_tasks: Vec<String>,
    pub pending_tasks: Vec<String>,
    pub artifacts: Vec<Artifact>,
    pub errors: Vec<SessionError>,
    pub iterations: u64,
    pub timestamp: DateTime<Utc>,
    pub last_checkpoint: Option<DateTime<Utc>>,
    pub phase_history: Option<Vec<(Phase, DateTime<Utc>)>>,
}

impl SessionState {
    pub fn new(mission_id: impl Into<String>, repository: std::path::PathBuf) -> Self {
        Self {
            session_id: format!("sess-{}", Uuid::new_v4()),
            mission_id: mission_id.into(),
            repository,
            cc_instance_id: format!("cc-{}", &Uuid::new_v4().simple().to_string()[..8]),
            current_phase: Phase::Initialization,
            completed_tasks: Vec::new(),
            pending_tasks: Vec::new(),
            artifacts: Vec::new(),
            errors: Vec::new(),
            iterations: 0,
            timestamp: Utc::now(),
            last_checkpoint: None,
            phase_history: Some(Vec::new()),
        }
    }

    /// Transition to a new phase, appending to `phase_history` if tracked.
    pub fn transition(&mut self, phase: Phase) {
        self.current_phase = phase;
        if let Some(history) = self.phase_history.as_mut() {
            history.push((phase, Utc::now()));
        }
    }

    /// Append a completed criterion id, deduplicated.
    pub fn record_completed(&mut self, criterion_id: &str) {
        if !self.completed_tasks.iter().any(|id| id == criterion_id) {
            self.completed_tasks.push(criterion_id.to_string());
        }
        self.pending_tasks.retain(|t| t != criterion_id);
    }

    /// Append an artifact, assigning `version = 1 + existing-for-path` per
    /// counting entries already present for that path when appending.
    pub fn add_artifact(&mut self, mut artifact: Artifact) {
        let existing = self.artifacts.iter().filter(|a| a.path == artifact.path).count();
        artifact.version = existing as u32 + 1;
        self.artifacts.push(artifact);
    }

    pub fn add_error(&mut self, error: SessionError) {
        self.errors.push(error);
    }

    /// Push a recovery action onto the front of the pending-task queue, so
    /// the next iteration's planning step consumes it instead of calling
    /// `manager.plan` again.
    pub fn push_recovery_action(&mut self, action: String) {
        self.pending_tasks.insert(0, action);
    }

    /// Pop the front of the pending-task queue, if any.
    pub fn take_next_pending_task(&mut self) -> Option<String> {
        if self.pending_tasks.is_empty() {
            None
        } else {
            Some(self.pending_tasks.remove(0))
        }
    }
}
