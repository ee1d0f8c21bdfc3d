//! Scheduler configuration

use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;
use crate::priority::Priority;

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Max jobs running at once. The default of 1 gives single-flight
    /// behavior: one job at a time, everything else queued.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Tier used by [`Scheduler::submit`](crate::Scheduler::submit) when the
    /// caller does not pick one
    #[serde(default)]
    pub default_priority: Priority,
}

fn default_max_concurrent() -> usize {
    1
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            default_priority: Priority::Low,
        }
    }
}

impl SchedulerConfig {
    /// Check that the configuration upholds the scheduler's invariants
    ///
    /// A zero capacity would leave every submitted job pending forever, so it
    /// is rejected here rather than silently accepted.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.max_concurrent == 0 {
            return Err(SchedulerError::InvalidCapacity(self.max_concurrent));
        }
        Ok(())
    }
}
