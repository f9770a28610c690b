//! Error classification and backoff policy for failed iterations.
//!
//! Retry behavior depends on *why* an iteration failed, not
//! just that it failed. Follows the `detector`/`policy` module habit of
//! classifying an observed condition into a small enum before deciding
//! what to do about it; the backoff math itself is new (PTY supervision
//! elsewhere either matches a known prompt or gives up, with no retry loop
//! of its own).

use std::time::Duration;

use crate::errors::OrchestrationError;

/// Why an iteration failed, driving the retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Backend reported a rate limit; back off exponentially and retry.
    RateLimited,
    /// Network blip, timeout, or similar — fixed short backoff, retry.
    Transient,
    /// Not retryable: bad input, protocol violation, or backend refused.
    Permanent,
    /// The run was cancelled; never retry.
    Cancelled,
}

impl ErrorKind {
    /// Classify an [`OrchestrationError`] for retry purposes.
    pub fn classify(error: &OrchestrationError) -> ErrorKind {
        match error {
            OrchestrationError::Cancelled => ErrorKind::Cancelled,
            OrchestrationError::Manager(crate::errors::ManagerError::Protocol(_)) => ErrorKind::Permanent,
            OrchestrationError::Manager(crate::errors::ManagerError::Failed(msg))
            | OrchestrationError::Executor(crate::errors::ExecutorError::Failed(msg)) => {
                if msg.to_lowercase().contains("rate limit") {
                    ErrorKind::RateLimited
                } else {
                    ErrorKind::Transient
                }
            }
            OrchestrationError::Executor(crate::errors::ExecutorError::Unavailable) => ErrorKind::Transient,
            OrchestrationError::ExecutorUnavailable => ErrorKind::Transient,
            OrchestrationError::Store(_) | OrchestrationError::Progress(_) | OrchestrationError::Config(_) => {
                ErrorKind::Permanent
            }
            OrchestrationError::Fatal { .. } => ErrorKind::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::RateLimited | ErrorKind::Transient)
    }
}

/// Computes backoff delays for a retry loop. Pure and deterministic given
/// an attempt count, so it's trivially testable without sleeping.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// Up to 3 attempts by default.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt should be made after `attempt` (1-based)
    /// failures of the given kind.
    pub fn should_retry(&self, kind: ErrorKind, attempt: u32) -> bool {
        kind.is_retryable() && attempt < self.max_attempts
    }

    /// Delay before the next attempt, given the 1-based `attempt` number
    /// that just failed.
    pub fn delay_for(&self, kind: ErrorKind, attempt: u32) -> Duration {
        match kind {
            ErrorKind::RateLimited => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
                let scaled = self.base_delay.saturating_mul(factor);
                scaled.min(self.max_delay)
            }
            ErrorKind::Transient => self.base_delay.min(self.max_delay),
            ErrorKind::Permanent | ErrorKind::Cancelled => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{ExecutorError, ManagerError};

    #[test]
    fn cancelled_is_never_retryable() {
        assert!(!ErrorKind::Cancelled.is_retryable());
    }

    #[test]
    fn rate_limited_message_classifies_as_rate_limited() {
        let err = OrchestrationError::Manager(ManagerError::Failed("Rate limit exceeded".to_string()));
        assert_eq!(ErrorKind::classify(&err), ErrorKind::RateLimited);
    }

    #[test]
    fn generic_executor_failure_classifies_as_transient() {
        let err = OrchestrationError::Executor(ExecutorError::Failed("connection reset".to_string()));
        assert_eq!(ErrorKind::classify(&err), ErrorKind::Transient);
    }

    #[test]
    fn protocol_violation_classifies_as_permanent() {
        let err = OrchestrationError::Manager(ManagerError::Protocol("bad json".to_string()));
        assert_eq!(ErrorKind::classify(&err), ErrorKind::Permanent);
    }

    #[test]
    fn rate_limited_backoff_grows_exponentially_and_caps() {
        let policy = RetryPolicy::default();
        let d1 = policy.delay_for(ErrorKind::RateLimited, 1);
        let d2 = policy.delay_for(ErrorKind::RateLimited, 2);
        let d3 = policy.delay_for(ErrorKind::RateLimited, 3);
        assert!(d2 > d1);
        assert!(d3 > d2);
        let d_huge = policy.delay_for(ErrorKind::RateLimited, 100);
        assert_eq!(d_huge, policy.max_delay);
    }

    #[test]
    fn transient_backoff_is_fixed() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(ErrorKind::Transient, 1), policy.base_delay);
        assert_eq!(policy.delay_for(ErrorKind::Transient, 4), policy.base_delay);
    }

    #[test]
    fn permanent_and_cancelled_never_retry() {
        let policy = RetryPolicy::default();
        assert!(!policy.should_retry(ErrorKind::Permanent, 1));
        assert!(!policy.should_retry(ErrorKind::Cancelled, 1));
    }

    #[test]
    fn should_retry_respects_max_attempts() {
        let policy = RetryPolicy { max_attempts: 3, ..RetryPolicy::default() };
        assert!(policy.should_retry(ErrorKind::Transient, 2));
        assert!(!policy.should_retry(ErrorKind::Transient, 3));
    }
}
