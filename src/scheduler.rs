//! Scheduler implementation

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::SchedulerConfig;
use crate::error::{JobError, SchedulerError};
use crate::handle::JobHandle;
use crate::priority::Priority;
use crate::queue::{BoxJob, JobOutcome, PendingJob, RunningJob, SchedulerStats};

/// Internal state protected by mutex
///
/// A key lives in at most one of `low`, `high`, or `running` at any instant.
/// The lock is held only across synchronous bookkeeping, never across job
/// execution, so unrelated jobs' actual work is never serialized.
struct SchedulerInner<T> {
    /// Low-priority pending entries, FIFO
    low: VecDeque<PendingJob<T>>,

    /// High-priority pending entries, FIFO
    high: VecDeque<PendingJob<T>>,

    /// Jobs currently executing, keyed by submission key
    running: HashMap<String, RunningJob<T>>,

    /// Whether `stop` has been called
    stopped: bool,

    /// Statistics
    stats: SchedulerStats,
}

impl<T> SchedulerInner<T> {
    /// Pop the next dispatchable entry: oldest high-tier first, then oldest
    /// low-tier
    fn pop_next(&mut self) -> Option<PendingJob<T>> {
        self.high.pop_front().or_else(|| self.low.pop_front())
    }

    fn pending(&self) -> usize {
        self.low.len() + self.high.len()
    }

    /// Drop every pending entry in both tiers. Dropping an entry drops its
    /// waiter senders, which settles the matching handles as `Cleared`.
    fn drop_pending(&mut self) {
        let dropped = self.pending();
        self.low.clear();
        self.high.clear();
        self.stats.total_cleared += dropped as u64;
    }
}

/// Key-addressed, priority-aware, concurrency-bounded job scheduler
///
/// Accepts `(key, job)` pairs, runs at most `max_concurrent` of them at
/// once, and never executes the same key twice concurrently: submitting a
/// key that is already pending or running coalesces into the single
/// in-flight result instead of queueing a duplicate.
///
/// The scheduler is cheap to clone; every clone operates on the same
/// collections.
pub struct Scheduler<T> {
    config: SchedulerConfig,
    inner: Arc<Mutex<SchedulerInner<T>>>,
}

impl<T> Clone for Scheduler<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Scheduler<T> {
    /// Create a new scheduler with the given configuration
    ///
    /// Fails fast with [`SchedulerError::InvalidCapacity`] rather than
    /// accepting a capacity that could never dispatch anything.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        debug!(?config, "Scheduler::new: called");
        config.validate()?;
        Ok(Self {
            config,
            inner: Arc::new(Mutex::new(SchedulerInner {
                low: VecDeque::new(),
                high: VecDeque::new(),
                running: HashMap::new(),
                stopped: false,
                stats: SchedulerStats::default(),
            })),
        })
    }

    /// Create a scheduler that runs up to `capacity` jobs at once
    pub fn with_capacity(capacity: usize) -> Result<Self, SchedulerError> {
        Self::new(SchedulerConfig {
            max_concurrent: capacity,
            ..Default::default()
        })
    }

    /// Submit a job under the configured default priority
    ///
    /// See [`submit_with_priority`](Self::submit_with_priority).
    pub async fn submit<F, Fut>(&self, key: impl Into<String>, job: F) -> Result<JobHandle<T>, SchedulerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = eyre::Result<T>> + Send + 'static,
    {
        self.submit_with_priority(key, job, self.config.default_priority).await
    }

    /// Submit a job for `key` at the given priority
    ///
    /// Exactly one execution happens per key while it is pending or running:
    /// - if `key` is already running, the new job closure is discarded and
    ///   the returned handle observes the in-flight result;
    /// - if `key` is pending in the high tier, the submission coalesces into
    ///   the existing entry (no tier or closure change);
    /// - if `key` is pending in the low tier and `priority` is high, the
    ///   entry is promoted to the back of the high tier and its closure
    ///   replaced with the newly supplied one;
    /// - if `key` is pending in the low tier and `priority` is low, the
    ///   closure is replaced in place (queue position kept);
    /// - otherwise a fresh entry joins the back of the selected tier.
    ///
    /// Every call returns a handle that settles with the execution's value
    /// or failure. Rejected with [`SchedulerError::Stopped`] after `stop`.
    pub async fn submit_with_priority<F, Fut>(
        &self,
        key: impl Into<String>,
        job: F,
        priority: Priority,
    ) -> Result<JobHandle<T>, SchedulerError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = eyre::Result<T>> + Send + 'static,
    {
        let key = key.into();
        debug!(%key, %priority, "Scheduler::submit: called");
        let job: BoxJob<T> = Box::new(move || job().boxed());
        let (tx, rx) = tokio::sync::oneshot::channel();

        {
            let mut inner = self.inner.lock().await;

            if inner.stopped {
                debug!(%key, "Scheduler::submit: scheduler stopped, rejecting");
                return Err(SchedulerError::Stopped);
            }

            if let Some(running) = inner.running.get_mut(&key) {
                // Already in flight: the new closure is discarded and the
                // caller observes the existing execution's settlement.
                debug!(%key, "Scheduler::submit: already running, attaching waiter");
                running.waiters.push(tx);
                inner.stats.total_coalesced += 1;
                return Ok(JobHandle::new(rx, key));
            }

            if let Some(entry) = inner.high.iter_mut().find(|e| e.key == key) {
                // Already queued at the highest tier; nothing to move or
                // replace, the caller just joins the waiter list.
                debug!(%key, "Scheduler::submit: already pending high, attaching waiter");
                entry.waiters.push(tx);
                inner.stats.total_coalesced += 1;
                return Ok(JobHandle::new(rx, key));
            }

            if let Some(idx) = inner.low.iter().position(|e| e.key == key) {
                inner.stats.total_coalesced += 1;
                if priority == Priority::High {
                    // Promote: same entry and waiters, new tier and closure.
                    debug!(%key, "Scheduler::submit: promoting from low to high tier");
                    if let Some(mut entry) = inner.low.remove(idx) {
                        entry.job = job;
                        entry.waiters.push(tx);
                        inner.high.push_back(entry);
                        inner.stats.total_promoted += 1;
                    }
                } else {
                    debug!(%key, "Scheduler::submit: already pending low, replacing closure");
                    let entry = &mut inner.low[idx];
                    entry.job = job;
                    entry.waiters.push(tx);
                }
                drop(inner);
                self.dispatch().await;
                return Ok(JobHandle::new(rx, key));
            }

            debug!(%key, %priority, "Scheduler::submit: inserting new entry");
            let entry = PendingJob::new(key.clone(), job, tx);
            match priority {
                Priority::High => inner.high.push_back(entry),
                Priority::Low => inner.low.push_back(entry),
            }
            inner.stats.total_submitted += 1;
            inner.stats.peak_queue_depth = inner.stats.peak_queue_depth.max(inner.pending());
        }

        self.dispatch().await;
        Ok(JobHandle::new(rx, key))
    }

    /// Check whether `key` is running or pending in either tier
    pub async fn has(&self, key: &str) -> bool {
        debug!(%key, "Scheduler::has: called");
        let inner = self.inner.lock().await;
        inner.running.contains_key(key)
            || inner.high.iter().any(|e| e.key == key)
            || inner.low.iter().any(|e| e.key == key)
    }

    /// Drop all pending entries in both tiers
    ///
    /// Running jobs are not cancelled. Handles for dropped entries settle as
    /// [`SchedulerError::Cleared`]; handles attached to running keys still
    /// observe their job's settlement.
    pub async fn clear(&self) {
        debug!("Scheduler::clear: called");
        let mut inner = self.inner.lock().await;
        inner.drop_pending();
    }

    /// Stop the scheduler
    ///
    /// Subsequent submissions are rejected with [`SchedulerError::Stopped`].
    /// Pending entries are abandoned the same way `clear` abandons them;
    /// jobs already running are left to finish.
    pub async fn stop(&self) {
        debug!("Scheduler::stop: called");
        let mut inner = self.inner.lock().await;
        inner.stopped = true;
        inner.drop_pending();
    }

    /// Check whether `stop` has been called
    pub async fn is_stopped(&self) -> bool {
        self.inner.lock().await.stopped
    }

    /// Total number of pending entries across both tiers
    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending()
    }

    /// Number of jobs currently executing
    pub async fn running_count(&self) -> usize {
        self.inner.lock().await.running.len()
    }

    /// Get a point-in-time view of the scheduler's collections
    pub async fn queue_state(&self) -> crate::queue::QueueState {
        debug!("Scheduler::queue_state: called");
        let inner = self.inner.lock().await;
        crate::queue::QueueState {
            running: inner.running.len(),
            pending_low: inner.low.len(),
            pending_high: inner.high.len(),
            stopped: inner.stopped,
            stats: inner.stats.clone(),
        }
    }

    /// Get the scheduler statistics
    pub async fn stats(&self) -> SchedulerStats {
        debug!("Scheduler::stats: called");
        self.inner.lock().await.stats.clone()
    }

    /// Fill free capacity slots from the pending tiers
    ///
    /// Idempotent work pump: called after every insertion and after every
    /// settlement. Selecting an entry and marking its key running happen
    /// under one lock acquisition, so no other path ever observes a key
    /// mid-transfer.
    fn dispatch(&self) -> futures::future::BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.inner.lock().await;

            while inner.running.len() < self.config.max_concurrent {
                let Some(entry) = inner.pop_next() else {
                    debug!("Scheduler::dispatch: no pending entries");
                    break;
                };
                let PendingJob {
                    key,
                    job,
                    waiters,
                    submitted_at,
                } = entry;

                debug!(%key, "Scheduler::dispatch: starting job");
                let now = Instant::now();
                inner.stats.total_wait_time_ms +=
                    now.duration_since(submitted_at).as_millis() as u64;
                inner.running.insert(key.clone(), RunningJob { waiters, started_at: now });
                inner.stats.peak_concurrent = inner.stats.peak_concurrent.max(inner.running.len());

                let scheduler = self.clone();
                tokio::spawn(async move {
                    let outcome = run_job(&key, job).await;
                    scheduler.complete(&key, outcome).await;
                });
            }
        })
    }

    /// Settle a finished job and pull in newly eligible work
    async fn complete(&self, key: &str, outcome: JobOutcome<T>) {
        debug!(%key, failed = outcome.is_err(), "Scheduler::complete: called");
        let mut inner = self.inner.lock().await;

        if let Some(running) = inner.running.remove(key) {
            match outcome {
                Ok(_) => inner.stats.total_completed += 1,
                Err(_) => inner.stats.total_failed += 1,
            }
            for waiter in running.waiters {
                // A dropped handle just means that caller lost interest.
                let _ = waiter.send(outcome.clone());
            }
        } else {
            debug!(%key, "Scheduler::complete: key not in running set");
        }

        drop(inner);
        self.dispatch().await;
    }
}

/// Run a job, converting its failure or panic into a fan-out-able outcome
///
/// A panicking job must still free its capacity slot, so panics are caught
/// here and settled as failures like any other.
async fn run_job<T>(key: &str, job: BoxJob<T>) -> JobOutcome<T> {
    match AssertUnwindSafe(job()).catch_unwind().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(report)) => {
            debug!(%key, %report, "run_job: job failed");
            Err(JobError::new(report))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            debug!(%key, %message, "run_job: job panicked");
            Err(JobError::new(eyre::eyre!("job panicked: {}", message)))
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
