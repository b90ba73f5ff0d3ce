//! Ready and waiting pools
//!
//! Both pools hold task ids in [`Bucket`]s and keep each record's `position`
//! in sync with its slot, so removal never has to search.

use crate::config::MAX_PRIORITY;
use crate::scheduler::bucket::Bucket;
use crate::scheduler::task::{EventId, Priority, TaskId, TaskState, TaskTable};

/// Tasks eligible to run, one bucket per priority level
///
/// The running task keeps its slot in its level while it runs; it leaves the
/// pool only when it waits on an event or terminates.
pub(crate) struct ReadyPool {
    buckets: Vec<Bucket<TaskId>>,
    /// Round-robin cursor per level. Advanced by selection, decremented by
    /// every removal from the level, both with wrapping arithmetic.
    cursors: Vec<u32>,
}

impl ReadyPool {
    pub(crate) fn new() -> Self {
        let levels = MAX_PRIORITY as usize + 1;
        Self {
            buckets: (0..levels).map(|_| Bucket::new()).collect(),
            cursors: vec![0; levels],
        }
    }

    /// Append a task to its priority level and mark it ready
    pub(crate) fn insert(&mut self, tasks: &mut TaskTable, id: TaskId) {
        let record = &mut tasks[id];
        record.position = self.buckets[record.priority as usize].append(id);
        record.state = TaskState::Ready;
    }

    /// Remove a task from its priority level
    pub(crate) fn remove(&mut self, tasks: &mut TaskTable, id: TaskId) {
        let (level, position) = {
            let record = &tasks[id];
            (record.priority as usize, record.position)
        };

        let bucket = &mut self.buckets[level];
        let removed = bucket.remove_at(position);
        debug_assert_eq!(removed, id, "ready bucket position out of sync");

        for (slot, shifted) in bucket.shifted_from(position) {
            tasks[*shifted].position = slot;
        }

        self.cursors[level] = self.cursors[level].wrapping_sub(1);
    }

    /// Pick the next task: highest non-empty level, rotating one slot per call
    pub(crate) fn select_next(&mut self) -> Option<TaskId> {
        for level in (0..self.buckets.len()).rev() {
            let bucket = &self.buckets[level];
            if bucket.is_empty() {
                continue;
            }

            let next = self.cursors[level].wrapping_add(1) % bucket.len() as u32;
            self.cursors[level] = next;
            return bucket.get(next as usize).copied();
        }

        None
    }

    /// Tasks at `priority` in bucket order
    pub(crate) fn level(&self, priority: Priority) -> &Bucket<TaskId> {
        &self.buckets[priority as usize]
    }

    /// Number of priority levels
    pub(crate) fn levels(&self) -> usize {
        self.buckets.len()
    }

    /// Total number of tasks across all levels
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }
}

/// Tasks blocked on an event, one bucket per event id
pub(crate) struct WaitingPool {
    buckets: Vec<Bucket<TaskId>>,
}

impl WaitingPool {
    pub(crate) fn new(event_space: u32) -> Self {
        Self {
            buckets: (0..event_space).map(|_| Bucket::new()).collect(),
        }
    }

    /// Append a task to the bucket of `event` and mark it waiting
    pub(crate) fn insert(&mut self, tasks: &mut TaskTable, id: TaskId, event: EventId) {
        let record = &mut tasks[id];
        record.position = self.buckets[event as usize].append(id);
        record.state = TaskState::Waiting;
    }

    /// Move every waiter on `event` to the ready pool in enqueue order
    ///
    /// Returns the number of tasks moved.
    pub(crate) fn drain_to_ready(
        &mut self,
        tasks: &mut TaskTable,
        event: EventId,
        ready: &mut ReadyPool,
    ) -> usize {
        let waiters: Vec<TaskId> = self.buckets[event as usize].drain().collect();
        for &id in &waiters {
            ready.insert(tasks, id);
        }
        waiters.len()
    }

    /// Tasks waiting on `event` in enqueue order
    pub(crate) fn event(&self, event: EventId) -> &Bucket<TaskId> {
        &self.buckets[event as usize]
    }

    /// Number of event buckets
    pub(crate) fn events(&self) -> usize {
        self.buckets.len()
    }

    /// Total number of waiting tasks
    pub(crate) fn len(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }
}
