//! Task identity, state and the per-task scheduling record

use parking_lot::Condvar;
use rustc_hash::FxHashMap;
use std::cell::Cell;
use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Task priority, `0..=MAX_PRIORITY`, higher runs first
pub type Priority = u32;

/// Event identifier, `0..event_space`
pub type EventId = u32;

/// Unique identifier for a Task
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

impl TaskId {
    /// Generate a new unique TaskId
    pub fn new() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the numeric ID value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// State of a Task
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Record created, not yet in the ready pool
    New,
    /// Eligible to run, held in a ready bucket
    Ready,
    /// Holds the running permit
    Running,
    /// Blocked on an event, held in a waiting bucket
    Waiting,
    /// Handler returned; never scheduled again
    Terminated,
}

thread_local! {
    static CURRENT_TASK: Cell<Option<TaskId>> = const { Cell::new(None) };
}

/// Task bound to the calling thread, if the thread is a task thread
pub(crate) fn current_task() -> Option<TaskId> {
    CURRENT_TASK.with(Cell::get)
}

/// Bind the calling thread to `id` for the rest of its life
pub(crate) fn bind_current_task(id: TaskId) {
    CURRENT_TASK.with(|current| current.set(Some(id)));
}

/// Scheduling record of one task
///
/// Records live in the scheduler's [`TaskTable`] and are only touched with the
/// scheduler lock held. The handler itself is owned by the task's thread.
pub(crate) struct TaskRecord {
    pub(crate) id: TaskId,
    pub(crate) parent: Option<TaskId>,
    pub(crate) priority: Priority,
    pub(crate) quantum: u32,
    pub(crate) state: TaskState,
    /// Slot inside whichever bucket currently holds the task
    pub(crate) position: usize,
    pub(crate) children: Vec<TaskId>,
    /// Private wake signal, always waited on with the scheduler lock
    pub(crate) wake: Arc<Condvar>,
    pub(crate) thread: Option<JoinHandle<()>>,
}

impl TaskRecord {
    pub(crate) fn new(id: TaskId, parent: Option<TaskId>, priority: Priority, quantum: u32) -> Self {
        Self {
            id,
            parent,
            priority,
            quantum,
            state: TaskState::New,
            position: 0,
            children: Vec::new(),
            wake: Arc::new(Condvar::new()),
            thread: None,
        }
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.state == TaskState::Terminated
    }
}

/// Arena of task records keyed by id
#[derive(Default)]
pub(crate) struct TaskTable {
    records: FxHashMap<TaskId, TaskRecord>,
}

impl TaskTable {
    pub(crate) fn insert(&mut self, record: TaskRecord) {
        self.records.insert(record.id, record);
    }

    /// Release a record slot
    pub(crate) fn release(&mut self, id: TaskId) -> Option<TaskRecord> {
        self.records.remove(&id)
    }

    pub(crate) fn get(&self, id: TaskId) -> Option<&TaskRecord> {
        self.records.get(&id)
    }

    pub(crate) fn contains(&self, id: TaskId) -> bool {
        self.records.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &TaskRecord> {
        self.records.values()
    }
}

impl Index<TaskId> for TaskTable {
    type Output = TaskRecord;

    fn index(&self, id: TaskId) -> &TaskRecord {
        match self.records.get(&id) {
            Some(record) => record,
            None => panic!("{} has no record in the task table", id),
        }
    }
}

impl IndexMut<TaskId> for TaskTable {
    fn index_mut(&mut self, id: TaskId) -> &mut TaskRecord {
        match self.records.get_mut(&id) {
            Some(record) => record,
            None => panic!("{} has no record in the task table", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_uniqueness() {
        let id1 = TaskId::new();
        let id2 = TaskId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
    }

    #[test]
    fn test_task_id_display() {
        let id = TaskId::new();
        assert_eq!(id.to_string(), format!("task-{}", id.as_u64()));
    }

    #[test]
    fn test_record_starts_new() {
        let record = TaskRecord::new(TaskId::new(), None, 3, 2);
        assert_eq!(record.state, TaskState::New);
        assert_eq!(record.priority, 3);
        assert_eq!(record.quantum, 2);
        assert!(record.children.is_empty());
        assert!(record.thread.is_none());
        assert!(!record.is_terminated());
    }

    #[test]
    fn test_table_insert_release() {
        let mut table = TaskTable::default();
        let id = TaskId::new();
        table.insert(TaskRecord::new(id, None, 0, 1));

        assert!(table.contains(id));
        assert_eq!(table.len(), 1);
        table[id].quantum = 9;
        assert_eq!(table[id].quantum, 9);

        let released = table.release(id).unwrap();
        assert_eq!(released.id, id);
        assert!(!table.contains(id));
        assert!(table.release(id).is_none());
    }

    #[test]
    #[should_panic(expected = "has no record")]
    fn test_table_index_unknown_panics() {
        let table = TaskTable::default();
        let _ = &table[TaskId::new()];
    }

    #[test]
    fn test_current_task_binding_is_per_thread() {
        let id = TaskId::new();
        let seen = std::thread::spawn(move || {
            assert_eq!(current_task(), None);
            bind_current_task(id);
            current_task()
        })
        .join()
        .unwrap();

        assert_eq!(seen, Some(id));
        assert_eq!(current_task(), None);
    }
}
