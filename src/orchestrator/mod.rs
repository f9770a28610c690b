//! The orchestration control loop.
//!
//! Drives a [`Mission`] through repeated `Planning -> Execution ->
//! Validation` cycles against a `Manager` and `Executor` backend pair,
//! persisting state through a `SessionStore` after every phase transition.
//! The phase machine and the "report audit events as they happen" shape
//! mirror a `run_session` PTY loop (output -> prompt detection -> policy
//! decision -> optional `SupervisorEvent`); here the events are
//! orchestration-level (iteration/retry/completion) and the loop body is
//! async rather than a blocking PTY read.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::errors::{ExecutorError, ManagerError, OrchestrationError};
use crate::executor::{Executor, ExecutionContext};
use crate::manager::Manager;
use crate::mission::Mission;
use crate::progress::{self, Progress};
use crate::retry::{ErrorKind, RetryPolicy};
use crate::session::log::{ExecutionLog, LogEvent};
use crate::session::store::SessionStore;
use crate::session::{Phase, SessionError, SessionState};
use crate::telemetry::TelemetrySink;

/// Observes orchestration events as they happen, independent of the
/// execution log (e.g. a CLI progress bar, or a test assertion hook).
/// Default methods are no-ops so most observers only implement what they
/// care about.
pub trait OrchestratorObserver: Send + Sync {
    fn on_phase(&self, _phase: Phase) {}
    fn on_iteration(&self, _iteration: u64, _progress: Progress) {}
    fn on_retry(&self, _kind: ErrorKind, _attempt: u32) {}
}

/// A silent observer, for callers that only want the execution log and
/// telemetry sink.
pub struct NullObserver;
impl OrchestratorObserver for NullObserver {}

/// Upper bound on total iterations regardless of retries, so a
/// misbehaving Manager/Executor pair can't loop forever even when every
/// individual failure looks retryable.
const MAX_ITERATIONS: u64 = 1000;

/// How often (in iterations) the main loop writes an immutable checkpoint
/// snapshot, independent of the per-phase `save` that happens every time.
const CHECKPOINT_INTERVAL: u64 = 5;

/// Tunables for one orchestration run.
pub struct OrchestratorConfig {
    pub retry_policy: RetryPolicy,
    pub max_iterations: u64,
    pub checkpoint_interval: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            max_iterations: MAX_ITERATIONS,
            checkpoint_interval: CHECKPOINT_INTERVAL,
        }
    }
}

/// Cooperative cancellation shared with a signal handler: a cancelled run
/// must stop before its next iteration, never mid-write. Same
/// `ctrlc`-driven stop-flag shape as a `run_watcher_loop` helper
/// (`Arc<AtomicBool>` polled at the top of the loop).
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Final outcome of an [`Orchestrator::orchestrate`] run.
#[derive(Debug)]
pub struct OrchestrationResult {
    pub session_id: String,
    pub success: bool,
    pub iterations: u64,
    pub final_progress: Progress,
}

/// Drives one mission to completion (or a fatal stop) against a chosen
/// Manager/Executor backend pair.
pub struct Orchestrator {
    manager: Box<dyn Manager>,
    executor: Box<dyn Executor>,
    store: Arc<dyn SessionStore>,
    telemetry: Box<dyn TelemetrySink>,
    observer: Box<dyn OrchestratorObserver>,
    config: OrchestratorConfig,
    cancellation: CancellationToken,
    log: Option<Arc<ExecutionLog>>,
}

impl Orchestrator {
    pub fn new(
        manager: Box<dyn Manager>,
        executor: Box<dyn Executor>,
        store: Arc<dyn SessionStore>,
        telemetry: Box<dyn TelemetrySink>,
    ) -> Self {
        Self {
            manager,
            executor,
            store,
            telemetry,
            observer: Box::new(NullObserver),
            config: OrchestratorConfig::default(),
            cancellation: CancellationToken::new(),
            log: None,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn OrchestratorObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn with_execution_log(mut self, log: Arc<ExecutionLog>) -> Self {
        self.log = Some(log);
        self
    }

    fn log(&self, event: LogEvent) {
        if let Some(log) = &self.log {
            if let Err(e) = log.log(event) {
                warn!("failed to write execution log entry: {e}");
            }
        }
    }

    /// Run `mission` to completion: repeatedly analyze, plan, execute, and
    /// validate against the next-highest-priority pending DoD criterion
    /// until [`progress::is_complete`] holds, a fatal error is hit, the
    /// run is cancelled, or `max_iterations` is exhausted.
    pub async fn orchestrate(&self, mission: &mut Mission) -> Result<OrchestrationResult, OrchestrationError> {
        let mut session = match self.store.find_active(&mission.id).await? {
            Some(existing) => {
                info!(session_id = %existing.session_id, "resuming the most recent active session");
                existing
            }
            None => {
                let fresh = SessionState::new(mission.id.clone(), mission.repository.clone());
                self.store.create(fresh.clone()).await?;
                fresh
            }
        };
        self.log(LogEvent::SessionCreated {
            session_id: session.session_id.clone(),
            mission_id: mission.id.clone(),
        });

        info!(session_id = %session.session_id, mission_id = %mission.id, "starting orchestration run");

        if !self.executor.validate_environment().await? {
            return Err(OrchestrationError::ExecutorUnavailable);
        }
        self.executor.start_session(&session.session_id).await?;

        let result = self.run_loop(mission, &mut session).await;

        if let Err(e) = self.store.checkpoint(&session.session_id).await {
            warn!("failed to write final checkpoint: {e}");
        }
        if let Err(e) = self.executor.end_session().await {
            warn!("executor end_session reported an error: {e}");
        }

        let success = result.is_ok();
        let final_progress = progress::progress(mission);
        self.telemetry.record_completion(&session.session_id, success, session.iterations);
        self.log(LogEvent::RunCompleted { success, iterations: session.iterations });

        result.map(|()| OrchestrationResult {
            session_id: session.session_id.clone(),
            success: true,
            iterations: session.iterations,
            final_progress,
        })
    }

    async fn run_loop(&self, mission: &mut Mission, session: &mut SessionState) -> Result<(), OrchestrationError> {
        loop {
            if self.cancellation.is_cancelled() {
                return Err(OrchestrationError::Cancelled);
            }

            if progress::is_complete(mission) {
                self.transition(session, Phase::Completion).await?;
                return Ok(());
            }

            if session.iterations >= self.config.max_iterations {
                return Err(OrchestrationError::Fatal {
                    session_error_id: "iteration-budget-exhausted".to_string(),
                    message: format!("exceeded max_iterations ({})", self.config.max_iterations),
                });
            }

            match self.execute_iteration(mission, session).await {
                Ok(()) => {
                    session.iterations += 1;
                    self.telemetry.record_iteration(&session.session_id, session.iterations);
                    self.observer.on_iteration(session.iterations, progress::progress(mission));
                    self.log(LogEvent::IterationCompleted {
                        iteration: session.iterations,
                        criterion_advanced: session.completed_tasks.last().cloned(),
                    });
                    if session.iterations % self.config.checkpoint_interval == 0 {
                        self.store.checkpoint(&session.session_id).await?;
                        self.log(LogEvent::CheckpointWritten { path: session.session_id.clone() });
                    }
                }
                Err(error) => {
                    self.handle_iteration_error(session, error).await?;
                }
            }
        }
    }

    async fn transition(&self, session: &mut SessionState, phase: Phase) -> Result<(), OrchestrationError> {
        let from = session.current_phase;
        session.transition(phase);
        self.store.save(session).await?;
        self.observer.on_phase(phase);
        self.log(LogEvent::PhaseTransition { from, to: phase });
        Ok(())
    }

    /// One `Planning -> Execution -> Validation` cycle against the next
    /// pending criterion, scanned CRITICAL first.
    async fn execute_iteration(&self, mission: &mut Mission, session: &mut SessionState) -> Result<(), OrchestrationError> {
        self.transition(session, Phase::Planning).await?;
        let next_progress = progress::progress(mission);
        let analysis = self.manager.analyze(mission, session, next_progress).await?;

        let next_criterion = progress::next_priority(mission)
            .ok_or_else(|| OrchestrationError::Fatal {
                session_error_id: "no-pending-criterion".to_string(),
                message: "planning requested with no pending DoD criterion".to_string(),
            })?
            .clone();

        // A recovery action pushed by a prior `handle_iteration_error` call
        // takes priority over asking the manager to plan from scratch.
        let instructions = match session.take_next_pending_task() {
            Some(action) => action,
            None => self.manager.plan(&analysis, &next_criterion, session).await?,
        };

        self.transition(session, Phase::Execution).await?;
        let context = ExecutionContext {
            session_id: session.session_id.clone(),
            repository: session.repository.clone(),
            instructions,
            iteration: session.iterations + 1,
            previous_artifacts: ExecutionContext::truncate_artifacts(&session.artifacts),
        };
        let execution_result = self.executor.execute(&context).await?;

        for artifact in &execution_result.artifacts {
            session.add_artifact(artifact.clone());
            self.log(LogEvent::ArtifactRecorded { path: artifact.path.clone(), version: artifact.version });
        }

        if !execution_result.success {
            return Err(OrchestrationError::Executor(ExecutorError::Failed(
                execution_result.error.clone().unwrap_or_else(|| "executor reported failure".to_string()),
            )));
        }

        self.transition(session, Phase::Validation).await?;
        let validation = self.manager.validate(&next_criterion, &execution_result, session).await?;

        if validation.completed {
            progress::mark_complete(mission, &next_criterion.id, validation.evidence)
                .map_err(OrchestrationError::from)?;
            session.record_completed(&next_criterion.id);
        }

        if execution_result.session_ended && !validation.completed {
            return Err(OrchestrationError::Executor(ExecutorError::Failed(
                "executor ended its session before validation succeeded".to_string(),
            )));
        }

        let next_phase = Phase::after_validation(progress::is_complete(mission));
        self.transition(session, next_phase).await?;
        Ok(())
    }

    /// Route a failed iteration through `manager.recover`, retrying with
    /// backoff when the error is retryable and recovery is approved;
    /// escalating to `OrchestrationError::Fatal` otherwise.
    async fn handle_iteration_error(
        &self,
        session: &mut SessionState,
        error: OrchestrationError,
    ) -> Result<(), OrchestrationError> {
        let kind = ErrorKind::classify(&error);
        let session_error = SessionError::new(format!("{kind:?}"), error.to_string());
        let error_id = session_error.id.clone();
        session.add_error(session_error.clone());
        self.store.add_error(&session.session_id, session_error.clone()).await?;
        self.log(LogEvent::ErrorRecorded {
            error_id: error_id.clone(),
            kind: format!("{kind:?}"),
            message: error.to_string(),
        });

        if matches!(kind, ErrorKind::Cancelled) {
            return Err(OrchestrationError::Cancelled);
        }

        self.transition(session, Phase::ErrorRecovery).await?;

        let recovery = match self.manager.recover(&session_error, session).await {
            Ok(recovery) => recovery,
            Err(manager_error) => return Err(manager_error.into()),
        };
        self.log(LogEvent::RecoveryDecision {
            can_recover: recovery.can_recover,
            recovery_action: recovery.recovery_action.clone(),
        });

        let attempt = session.errors.len() as u32;
        if !recovery.can_recover || !self.config.retry_policy.should_retry(kind, attempt) {
            return Err(OrchestrationError::Fatal {
                session_error_id: error_id,
                message: recovery.reason.unwrap_or(error.to_string()),
            });
        }

        if let Some(action) = recovery.recovery_action.clone() {
            session.push_recovery_action(action);
        }

        let delay = self.config.retry_policy.delay_for(kind, attempt);
        self.telemetry.record_retry(&session.session_id, &format!("{kind:?}"), attempt);
        self.observer.on_retry(kind, attempt);
        self.log(LogEvent::ManagerCallRetried {
            operation: "execute_iteration".to_string(),
            attempt,
            kind: format!("{kind:?}"),
        });
        debug!(attempt, delay_ms = delay.as_millis() as u64, "backing off before retry");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.transition(session, Phase::Planning).await?;
        Ok(())
    }
}
