//! Scheduler error types

use std::sync::Arc;

use thiserror::Error;

/// A job's own failure, propagated verbatim to every caller that submitted
/// (or re-submitted) its key
///
/// Wraps the report in an `Arc` so the same failure can fan out to every
/// coalesced waiter without cloning the underlying error chain.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct JobError(Arc<eyre::Report>);

impl JobError {
    pub(crate) fn new(report: eyre::Report) -> Self {
        Self(Arc::new(report))
    }

    /// The underlying failure report
    pub fn report(&self) -> &eyre::Report {
        &self.0
    }
}

/// Errors that can occur during scheduler operations
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Capacity must be at least 1; a zero-capacity scheduler could never
    /// dispatch anything
    #[error("capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),

    /// The scheduler was stopped and rejects new submissions
    #[error("scheduler is stopped")]
    Stopped,

    /// The job was dropped from the pending tiers by `clear` or `stop`
    /// before it was ever dispatched
    #[error("job was cleared before it could run")]
    Cleared,

    /// The job ran and failed; the failure settles this key's result for
    /// every coalesced caller
    #[error("job failed: {0}")]
    JobFailed(#[source] JobError),
}

impl SchedulerError {
    /// Check if this is a job's own failure rather than a scheduler condition
    pub fn is_job_failure(&self) -> bool {
        matches!(self, SchedulerError::JobFailed(_))
    }

    /// Get the job failure if that is what this error is
    pub fn job_error(&self) -> Option<&JobError> {
        match self {
            SchedulerError::JobFailed(err) => Some(err),
            _ => None,
        }
    }
}
