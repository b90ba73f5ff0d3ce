//! Point-in-time copy of scheduler state, with invariant checking

use crate::scheduler::scheduler::Core;
use crate::scheduler::task::{EventId, Priority, TaskId, TaskState};
use rustc_hash::FxHashMap;

/// Copy of one task record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    /// Task id
    pub id: TaskId,
    /// Spawning task, `None` for top-level tasks
    pub parent: Option<TaskId>,
    /// Fixed priority
    pub priority: Priority,
    /// Lifecycle state
    pub state: TaskState,
    /// Remaining quantum
    pub quantum: u32,
    /// Slot in the bucket holding the task
    pub position: usize,
    /// Children not yet reaped
    pub children: Vec<TaskId>,
}

/// Consistent copy of every live task record and pool bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSnapshot {
    /// Holder of the running permit
    pub running: Option<TaskId>,
    /// First task of the session
    pub root: Option<TaskId>,
    /// Configured quantum
    pub quantum: u32,
    /// Live task records, ordered by id
    pub tasks: Vec<TaskSnapshot>,
    /// Ready buckets indexed by priority
    pub ready: Vec<Vec<TaskId>>,
    /// Waiting buckets indexed by event id
    pub waiting: Vec<Vec<TaskId>>,
}

impl SchedulerSnapshot {
    pub(crate) fn capture(core: &Core) -> Self {
        let mut tasks: Vec<_> = core
            .tasks
            .values()
            .map(|record| TaskSnapshot {
                id: record.id,
                parent: record.parent,
                priority: record.priority,
                state: record.state,
                quantum: record.quantum,
                position: record.position,
                children: record.children.clone(),
            })
            .collect();
        tasks.sort_by_key(|task| task.id);

        Self {
            running: core.running,
            root: core.root,
            quantum: core.config.quantum,
            tasks,
            ready: (0..core.ready.levels())
                .map(|level| core.ready.level(level as Priority).iter().copied().collect())
                .collect(),
            waiting: (0..core.waiting.events())
                .map(|event| core.waiting.event(event as EventId).iter().copied().collect())
                .collect(),
        }
    }

    /// Record of `id`, if still live
    pub fn task(&self, id: TaskId) -> Option<&TaskSnapshot> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Tasks in `state`
    pub fn count_in(&self, state: TaskState) -> usize {
        self.tasks.iter().filter(|task| task.state == state).count()
    }

    /// Tasks waiting on `event`, in enqueue order
    pub fn waiting_on(&self, event: EventId) -> &[TaskId] {
        self.waiting
            .get(event as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Describe every broken scheduler invariant; empty when consistent
    ///
    /// Checked: at most one running task, matching the permit holder; ready
    /// and waiting tasks sit in exactly one bucket of the right kind at their
    /// recorded slot; the running task keeps only its rotation slot in its
    /// ready level; new and terminated tasks sit in no bucket; quanta stay
    /// within the configured value.
    pub fn violations(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let running: Vec<_> = self
            .tasks
            .iter()
            .filter(|task| task.state == TaskState::Running)
            .map(|task| task.id)
            .collect();
        if running.len() > 1 {
            problems.push(format!("{} tasks running at once: {:?}", running.len(), running));
        }
        if running.first().copied() != self.running && running.len() <= 1 {
            problems.push(format!(
                "permit holder {:?} does not match running tasks {:?}",
                self.running, running
            ));
        }

        // (kind, bucket index, slot) for every bucket entry
        let mut placements: FxHashMap<TaskId, Vec<(Kind, usize, usize)>> = FxHashMap::default();
        for (level, bucket) in self.ready.iter().enumerate() {
            for (slot, id) in bucket.iter().enumerate() {
                placements.entry(*id).or_default().push((Kind::Ready, level, slot));
            }
        }
        for (event, bucket) in self.waiting.iter().enumerate() {
            for (slot, id) in bucket.iter().enumerate() {
                placements.entry(*id).or_default().push((Kind::Waiting, event, slot));
            }
        }

        for id in placements.keys() {
            if self.task(*id).is_none() {
                problems.push(format!("{} is pooled but has no record", id));
            }
        }

        for task in &self.tasks {
            let placed = placements.get(&task.id).map(Vec::as_slice).unwrap_or(&[]);
            let expected = match task.state {
                TaskState::Ready | TaskState::Running => {
                    Some((Kind::Ready, task.priority as usize, task.position))
                }
                TaskState::Waiting => None,
                TaskState::New | TaskState::Terminated => {
                    if !placed.is_empty() {
                        problems.push(format!("{} is {:?} but pooled", task.id, task.state));
                    }
                    continue;
                }
            };

            match (placed, expected) {
                ([only], Some(expected)) if *only == expected => {}
                ([(Kind::Waiting, _, slot)], None) if *slot == task.position => {}
                _ => problems.push(format!(
                    "{} is {:?} but placed at {:?}",
                    task.id, task.state, placed
                )),
            }

            if task.quantum > self.quantum {
                problems.push(format!(
                    "{} has quantum {} above configured {}",
                    task.id, task.quantum, self.quantum
                ));
            }
            if task.state == TaskState::Running && task.quantum == 0 {
                problems.push(format!("{} is running with an exhausted quantum", task.id));
            }
        }

        problems
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Ready,
    Waiting,
}
