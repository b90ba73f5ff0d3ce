//! Scheduler configuration and compile-time ceilings

use crate::{ArgumentError, SchedResult};
use serde::{Deserialize, Serialize};

/// Highest task priority. Priorities run from 0 (lowest) to this value.
pub const MAX_PRIORITY: u32 = 5;

/// Largest event space a session may be initialized with
pub const MAX_EVENT_COUNT: u32 = 256;

/// Quantum used by `SchedulerConfig::default()`
pub const DEFAULT_QUANTUM: u32 = 4;

/// Session configuration passed to `Scheduler::initialize_with`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Steps a task may perform before it is preempted
    pub quantum: u32,

    /// Number of event ids, valid events are `0..event_space`
    pub event_space: u32,
}

impl SchedulerConfig {
    /// Create a configuration
    pub fn new(quantum: u32, event_space: u32) -> Self {
        Self {
            quantum,
            event_space,
        }
    }

    /// Check the configuration against the scheduler ceilings
    pub fn validate(&self) -> SchedResult<()> {
        if self.quantum < 1 {
            return Err(ArgumentError::Quantum(self.quantum).into());
        }
        if self.event_space > MAX_EVENT_COUNT {
            return Err(ArgumentError::EventSpace {
                requested: self.event_space,
                max: MAX_EVENT_COUNT,
            }
            .into());
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_QUANTUM, 16)
    }
}
