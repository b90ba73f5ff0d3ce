//! Entry routine of every task thread
//!
//! A task thread waits for its first turn, runs the handler exactly once,
//! retires itself (passing the permit on), then joins and releases its own
//! children. Children never outlive the thread of their parent.

use crate::scheduler::scheduler::{park, terminate, Scheduler};
use crate::scheduler::task::{bind_current_task, Priority, TaskId};
use parking_lot::Condvar;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{error, trace};

/// Start the native thread backing task `id`
///
/// The thread blocks until the scheduler grants `id` the running permit.
pub(crate) fn start<F>(
    scheduler: Scheduler,
    id: TaskId,
    priority: Priority,
    wake: Arc<Condvar>,
    handler: F,
) -> JoinHandle<()>
where
    F: FnOnce(&Scheduler, Priority) + Send + 'static,
{
    thread::Builder::new()
        .name(format!("tandem-{}", id))
        .spawn(move || run(scheduler, id, priority, wake, handler))
        .expect("Failed to spawn task thread")
}

fn run<F>(scheduler: Scheduler, id: TaskId, priority: Priority, wake: Arc<Condvar>, handler: F)
where
    F: FnOnce(&Scheduler, Priority),
{
    bind_current_task(id);
    {
        let mut core = scheduler.shared.core.lock();
        park(&mut core, id, &wake);
    }
    trace!(task = %id, priority, "task started");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&scheduler, priority)));

    let children = {
        let mut core = scheduler.shared.core.lock();
        if let Err(payload) = outcome {
            error!(task = %id, panic = panic_message(payload.as_ref()), "task handler panicked");
            core.stats.handler_panics += 1;
        }
        terminate(&mut core, id)
    };

    reap(&scheduler, id, children);
}

/// Join every child thread, then release its record
fn reap(scheduler: &Scheduler, parent: TaskId, children: Vec<TaskId>) {
    for child in children {
        let handle = scheduler.shared.core.lock().tasks[child].thread.take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!(task = %child, "task thread exited abnormally");
            }
        }

        let mut core = scheduler.shared.core.lock();
        core.tasks.release(child);
        core.stats.tasks_joined += 1;
        trace!(task = %child, parent = %parent, "child reaped");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}
