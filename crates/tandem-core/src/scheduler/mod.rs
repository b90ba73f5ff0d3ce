//! Task Scheduler - Single-Permit Cooperative Scheduling
//!
//! Each task runs on its own native thread, but a task only proceeds while it
//! holds the running permit. Scheduling decisions (spawn, steps, event
//! waits and signals, termination) happen under one lock and end with a
//! hand-off that wakes exactly one task and parks the previous one.

mod bucket;
mod pool;
#[allow(clippy::module_inception)]
mod scheduler;
mod snapshot;
mod task;
mod trampoline;

pub use bucket::Bucket;
pub use scheduler::{Scheduler, SchedulerStats};
pub use snapshot::{SchedulerSnapshot, TaskSnapshot};
pub use task::{EventId, Priority, TaskId, TaskState};
