//! Tandem Scheduler Core
//!
//! This crate provides a cooperative, priority-driven scheduler for tasks that
//! each own a native OS thread:
//! - Priority ready pool with round-robin rotation inside a level
//! - Event-keyed waiting pool with broadcast wake-up
//! - Fixed time quantum consumed by steps, spawns and signals
//! - A single running permit handed from task to task under one lock
//!
//! Every task body runs on its own thread, but only the task holding the
//! permit is ever unblocked, so handler code executes strictly one task at a
//! time.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod scheduler;

pub use config::{SchedulerConfig, DEFAULT_QUANTUM, MAX_EVENT_COUNT, MAX_PRIORITY};
pub use scheduler::{
    EventId, Priority, Scheduler, SchedulerSnapshot, SchedulerStats, TaskId, TaskSnapshot,
    TaskState,
};

/// Invalid argument passed to a scheduler operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArgumentError {
    /// Quantum must be at least one step
    #[error("quantum must be at least 1, got {0}")]
    Quantum(u32),

    /// Priority above `MAX_PRIORITY`
    #[error("priority {priority} exceeds maximum {max}")]
    Priority {
        /// Requested priority
        priority: Priority,
        /// Highest accepted priority
        max: Priority,
    },

    /// Event id outside the configured event space
    #[error("event {event} outside event space of {event_space}")]
    Event {
        /// Requested event id
        event: EventId,
        /// Configured number of events
        event_space: u32,
    },

    /// Event space above `MAX_EVENT_COUNT`
    #[error("event space {requested} exceeds maximum {max}")]
    EventSpace {
        /// Requested event space
        requested: u32,
        /// Largest accepted event space
        max: u32,
    },
}

/// Scheduler errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedError {
    /// Argument validation failed; no state was changed
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] ArgumentError),

    /// `initialize` called while a session is active
    #[error("Scheduler already initialized")]
    AlreadyInitialized,

    /// Operation called outside an initialized session
    #[error("Scheduler not initialized")]
    NotInitialized,

    /// Task-only operation called from a thread that does not hold the running permit
    #[error("Calling thread is not the running task")]
    NotRunningTask,

    /// `shutdown` called from inside one of the scheduler's own tasks
    #[error("Shutdown called from task {0:?}")]
    ShutdownFromTask(TaskId),
}

/// Scheduler operation result
pub type SchedResult<T> = Result<T, SchedError>;
