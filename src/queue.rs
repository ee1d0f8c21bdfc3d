//! Queue entry types and introspection for the scheduler

use std::time::Instant;

use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::error::JobError;

/// Boxed job closure: invoked at most once, when its key is dispatched
pub(crate) type BoxJob<T> = Box<dyn FnOnce() -> BoxFuture<'static, eyre::Result<T>> + Send>;

/// What a settled job hands to its waiters
pub(crate) type JobOutcome<T> = Result<T, JobError>;

/// A job waiting in one of the two pending tiers
///
/// Carries every oneshot sender handed out for its key so far; the senders
/// travel with the entry through promotion and into the running map, and all
/// of them observe the same settlement.
pub(crate) struct PendingJob<T> {
    pub key: String,
    pub job: BoxJob<T>,
    pub waiters: Vec<oneshot::Sender<JobOutcome<T>>>,
    pub submitted_at: Instant,
}

impl<T> PendingJob<T> {
    pub fn new(key: String, job: BoxJob<T>, waiter: oneshot::Sender<JobOutcome<T>>) -> Self {
        Self {
            key,
            job,
            waiters: vec![waiter],
            submitted_at: Instant::now(),
        }
    }
}

impl<T> std::fmt::Debug for PendingJob<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingJob")
            .field("key", &self.key)
            .field("waiters", &self.waiters.len())
            .field("submitted_at", &self.submitted_at)
            .finish_non_exhaustive()
    }
}

/// Bookkeeping for a job currently executing
pub(crate) struct RunningJob<T> {
    pub waiters: Vec<oneshot::Sender<JobOutcome<T>>>,
    pub started_at: Instant,
}

impl<T> std::fmt::Debug for RunningJob<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningJob")
            .field("waiters", &self.waiters.len())
            .field("started_at", &self.started_at)
            .finish()
    }
}

/// Statistics for the scheduler
#[derive(Debug, Default, Clone)]
pub struct SchedulerStats {
    /// Distinct jobs accepted into a pending tier
    pub total_submitted: u64,
    /// Submissions folded into an already pending or running key
    pub total_coalesced: u64,
    /// Low-tier entries moved to the high tier
    pub total_promoted: u64,
    /// Jobs that ran to a successful settlement
    pub total_completed: u64,
    /// Jobs that settled as a failure
    pub total_failed: u64,
    /// Pending entries dropped by `clear` or `stop`
    pub total_cleared: u64,
    /// Accumulated time jobs spent waiting in a tier, in milliseconds
    pub total_wait_time_ms: u64,
    /// Largest combined pending depth observed
    pub peak_queue_depth: usize,
    /// Most jobs observed running at once
    pub peak_concurrent: usize,
}

/// Point-in-time view of the scheduler's collections
#[derive(Debug, Clone)]
pub struct QueueState {
    pub running: usize,
    pub pending_low: usize,
    pub pending_high: usize,
    pub stopped: bool,
    pub stats: SchedulerStats,
}

impl QueueState {
    /// Total pending entries across both tiers
    pub fn pending(&self) -> usize {
        self.pending_low + self.pending_high
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use futures::FutureExt;

    fn noop_job() -> BoxJob<u32> {
        Box::new(|| async { Ok(0) }.boxed())
    }

    #[test]
    fn test_pending_job_starts_with_one_waiter() {
        let (tx, _rx) = oneshot::channel();
        let entry = PendingJob::new("key".to_string(), noop_job(), tx);
        assert_eq!(entry.waiters.len(), 1);
        assert_eq!(entry.key, "key");
    }

    #[test]
    fn test_pending_job_debug_omits_closure() {
        let (tx, _rx) = oneshot::channel();
        let entry = PendingJob::new("key".to_string(), noop_job(), tx);
        let debug = format!("{:?}", entry);
        assert!(debug.contains("\"key\""));
        assert!(debug.contains("waiters"));
    }

    #[test]
    fn test_queue_state_pending_sums_tiers() {
        let state = QueueState {
            running: 1,
            pending_low: 2,
            pending_high: 3,
            stopped: false,
            stats: SchedulerStats::default(),
        };
        assert_eq!(state.pending(), 5);
    }
}
