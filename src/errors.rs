//! Typed error taxonomy for the orchestration core.
//!
//! Mirrors the kinds in the orchestration contract: each backend call and
//! store operation fails with one of these, and the retry policy classifies
//! them into [`crate::retry::ErrorKind`] to decide whether (and how) to
//! retry. The public [`Orchestrator::orchestrate`](crate::orchestrator::Orchestrator::orchestrate)
//! surfaces a single fatal `OrchestrationError` to the top-level caller.

use thiserror::Error;

/// Errors from the Mission/DoD data model.
#[derive(Debug, Error)]
pub enum MissionError {
    #[error("mission must have at least one DoD criterion")]
    EmptyDefinitionOfDone,

    #[error("duplicate DoD criterion id: {0}")]
    DuplicateCriterion(String),

    #[error("DoD criterion description must not be empty (id: {0})")]
    EmptyDescription(String),
}

/// Errors from pure progress-tracking functions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProgressError {
    #[error("no DoD criterion with id '{0}' in this mission")]
    CriterionNotFound(String),
}

/// Errors from a [`crate::session::store::SessionStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to (de)serialize session state: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("no session found with id '{0}'")]
    NotFound(String),

    #[error("session '{0}' has no saved state or checkpoint to recover from")]
    SessionNotRecoverable(String),
}

/// Errors surfaced by a [`crate::manager::Manager`] backend call.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// A retriable failure reported by (or while calling) the backend.
    #[error("manager backend call failed: {0}")]
    Failed(String),

    /// The backend's reply could not be coerced into a structured result at all.
    #[error("manager backend reply could not be parsed: {0}")]
    Protocol(String),
}

/// Errors surfaced by an [`crate::executor::Executor`] backend call.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("executor reported failure: {0}")]
    Failed(String),

    #[error("executor environment validation failed")]
    Unavailable,
}

/// Top-level fatal error returned by [`Orchestrator::orchestrate`](crate::orchestrator::Orchestrator::orchestrate).
///
/// Anything recoverable is handled internally (retried, or routed through
/// `manager.recover`); only genuinely fatal conditions escape as this type.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("invalid or missing configuration: {0}")]
    Config(String),

    #[error("executor environment is unavailable, aborting before first iteration")]
    ExecutorUnavailable,

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Progress(#[from] ProgressError),

    #[error("run was cancelled")]
    Cancelled,

    /// A fatal error with the id of the [`crate::session::SessionError`] record
    /// persisted for post-mortem.
    #[error("fatal error during iteration (see session error {session_error_id}): {message}")]
    Fatal {
        session_error_id: String,
        message: String,
    },
}
