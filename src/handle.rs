//! JobHandle - Caller-side view of a submitted job

use tokio::sync::oneshot;
use tracing::debug;

use crate::error::SchedulerError;
use crate::queue::JobOutcome;

/// Handle to the eventual result of a submitted job
///
/// Every submission of a key while it is pending or running gets its own
/// handle, and all of them observe the same settlement: the value or failure
/// of the single execution for that key.
#[derive(Debug)]
pub struct JobHandle<T> {
    rx: oneshot::Receiver<JobOutcome<T>>,
    key: String,
}

impl<T> JobHandle<T> {
    pub(crate) fn new(rx: oneshot::Receiver<JobOutcome<T>>, key: String) -> Self {
        Self { rx, key }
    }

    /// Get the key this handle is tied to
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Wait for the job to settle
    ///
    /// Returns the job's value, its failure as
    /// [`SchedulerError::JobFailed`], or [`SchedulerError::Cleared`] if the
    /// entry was dropped by `clear` or `stop` before it could run.
    pub async fn wait(self) -> Result<T, SchedulerError> {
        debug!(key = %self.key, "JobHandle::wait: called");
        match self.rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                debug!(key = %self.key, %err, "JobHandle::wait: job failed");
                Err(SchedulerError::JobFailed(err))
            }
            Err(_) => {
                debug!(key = %self.key, "JobHandle::wait: entry was cleared");
                Err(SchedulerError::Cleared)
            }
        }
    }

    /// Check for a settlement without blocking
    ///
    /// Returns `None` while the job is still pending or running.
    pub fn try_wait(&mut self) -> Option<Result<T, SchedulerError>> {
        debug!(key = %self.key, "JobHandle::try_wait: called");
        match self.rx.try_recv() {
            Ok(Ok(value)) => Some(Ok(value)),
            Ok(Err(err)) => Some(Err(SchedulerError::JobFailed(err))),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(SchedulerError::Cleared)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;

    #[tokio::test]
    async fn test_wait_returns_value() {
        let (tx, rx) = oneshot::channel::<JobOutcome<u32>>();
        let handle = JobHandle::new(rx, "k".to_string());

        tx.send(Ok(7)).unwrap();
        assert_eq!(handle.wait().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_wait_surfaces_job_failure() {
        let (tx, rx) = oneshot::channel::<JobOutcome<u32>>();
        let handle = JobHandle::new(rx, "k".to_string());

        tx.send(Err(JobError::new(eyre::eyre!("boom")))).unwrap();
        let err = handle.wait().await.unwrap_err();
        assert!(err.is_job_failure());
    }

    #[tokio::test]
    async fn test_wait_maps_dropped_sender_to_cleared() {
        let (tx, rx) = oneshot::channel::<JobOutcome<u32>>();
        let handle = JobHandle::new(rx, "k".to_string());

        drop(tx);
        assert!(matches!(handle.wait().await, Err(SchedulerError::Cleared)));
    }

    #[tokio::test]
    async fn test_try_wait_pending_then_settled() {
        let (tx, rx) = oneshot::channel::<JobOutcome<u32>>();
        let mut handle = JobHandle::new(rx, "k".to_string());

        assert!(handle.try_wait().is_none());

        tx.send(Ok(3)).unwrap();
        assert_eq!(handle.try_wait().unwrap().unwrap(), 3);
    }

    #[test]
    fn test_handle_key() {
        let (_tx, rx) = oneshot::channel::<JobOutcome<u32>>();
        let handle = JobHandle::new(rx, "page:/about".to_string());
        assert_eq!(handle.key(), "page:/about");
    }
}
