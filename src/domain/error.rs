//! Error taxonomy for the fix-and-verify loop.
//!
//! Only [`AgentError::Configuration`] and [`AgentError::PolicyViolation`]
//! terminate a job without consuming retries; everything else is recorded
//! and recovered within the retry loop.

use thiserror::Error;

use super::models::job::JobStatus;

/// Errors raised by the agent subsystems.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A required external credential or setting is missing. Aborts the job
    /// before any repository state is mutated.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Branch or commit policy was violated. Aborts immediately, never
    /// retried.
    #[error("policy violation: {0}")]
    PolicyViolation(String),

    /// A sandboxed or local command exited non-zero. Recorded as a failed
    /// test result and drives another retry.
    #[error("execution failed: {0}")]
    Execution(String),

    /// A patch failed to apply or its fallback failed. Recorded per issue,
    /// never aborts the batch.
    #[error("patch failed: {0}")]
    Patch(String),

    /// Push or poll network failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl AgentError {
    /// Terminal job status for an error that escaped the retry loop.
    pub fn terminal_status(&self) -> JobStatus {
        match self {
            Self::Configuration(_) => JobStatus::ConfigurationError,
            Self::PolicyViolation(_) => JobStatus::PolicyViolation,
            _ => JobStatus::Error,
        }
    }
}

pub type AgentResult<T> = Result<T, AgentError>;

impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        AgentError::Execution(err.to_string())
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Execution(err.to_string())
    }
}
