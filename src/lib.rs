//! keyq - Key-addressed, priority-aware, concurrency-bounded job scheduler
//!
//! keyq runs asynchronous jobs identified by caller-chosen keys (typically
//! resource identifiers such as URLs) with a fixed cap on how many execute
//! at once. Submissions wait in one of two priority tiers; the high tier is
//! always dispatched first, strict FIFO within a tier.
//!
//! # Core Concepts
//!
//! - **Single flight per key**: a key is never executed twice concurrently.
//!   Resubmitting a pending or running key coalesces into the one in-flight
//!   execution, and every handle observes the same settlement.
//! - **Promotion**: resubmitting a low-tier key at high priority moves it to
//!   the high tier without re-executing or duplicating it.
//! - **Self-driving dispatch**: whenever a slot frees up or work arrives,
//!   the scheduler pulls the next eligible entry itself; callers never poll.
//! - **Isolated failures**: a job's failure settles only its own key's
//!   handles and frees the slot; sibling jobs are untouched.
//!
//! # Modules
//!
//! - [`scheduler`] - The [`Scheduler`] itself
//! - [`handle`] - [`JobHandle`], the caller-side future of a submission
//! - [`config`] - Configuration types
//! - [`priority`] - The two pending tiers
//! - [`error`] - Error types
//!
//! # Example
//!
//! ```no_run
//! use keyq::{Priority, Scheduler};
//!
//! # async fn demo() -> Result<(), keyq::SchedulerError> {
//! let scheduler = Scheduler::with_capacity(2)?;
//!
//! // Eager background preload, low priority
//! let eager = scheduler
//!     .submit("page:/pricing", || async { Ok("…body…".to_string()) })
//!     .await?;
//!
//! // The user is hovering the link now: promote it
//! let hover = scheduler
//!     .submit_with_priority("page:/pricing", || async { Ok("…body…".to_string()) }, Priority::High)
//!     .await?;
//!
//! // Both handles observe the single execution's result
//! let body = hover.wait().await?;
//! # let _ = (eager, body);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod handle;
pub mod priority;
pub mod queue;
pub mod scheduler;

// Re-export commonly used types
pub use config::SchedulerConfig;
pub use scheduler::Scheduler;
pub use error::{JobError, SchedulerError};
pub use handle::JobHandle;
pub use priority::Priority;
pub use queue::{QueueState, SchedulerStats};
