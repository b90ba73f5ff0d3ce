//! Main scheduler: session lifecycle, task operations and the permit hand-off

use crate::config::{SchedulerConfig, MAX_PRIORITY};
use crate::scheduler::pool::{ReadyPool, WaitingPool};
use crate::scheduler::snapshot::SchedulerSnapshot;
use crate::scheduler::task::{
    current_task, EventId, Priority, TaskId, TaskRecord, TaskState, TaskTable,
};
use crate::scheduler::trampoline;
use crate::{ArgumentError, SchedError, SchedResult};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Scheduler statistics for the current (or last) session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Total tasks spawned
    pub tasks_spawned: u64,

    /// Tasks whose handler returned (or panicked)
    pub tasks_terminated: u64,

    /// Task threads joined and released
    pub tasks_joined: u64,

    /// Handlers that panicked
    pub handler_panics: u64,

    /// Permit transfers between two different tasks, or from nobody to a task
    pub hand_offs: u64,

    /// Successful `signal_event` calls
    pub events_signaled: u64,

    /// Tasks moved from waiting to ready by signals
    pub tasks_woken: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Session {
    Idle,
    Active,
    /// `shutdown` is joining top-level tasks; tasks may still schedule
    ShuttingDown,
}

/// State guarded by the scheduler lock
pub(crate) struct Core {
    pub(crate) session: Session,
    pub(crate) config: SchedulerConfig,
    pub(crate) tasks: TaskTable,
    pub(crate) ready: ReadyPool,
    pub(crate) waiting: WaitingPool,
    /// Holder of the running permit
    pub(crate) running: Option<TaskId>,
    pub(crate) root: Option<TaskId>,
    /// Tasks spawned by the host thread, joined by `shutdown`
    pub(crate) top_level: Vec<TaskId>,
    pub(crate) stats: SchedulerStats,
}

impl Core {
    fn new(session: Session, config: SchedulerConfig) -> Self {
        Self {
            session,
            config,
            tasks: TaskTable::default(),
            ready: ReadyPool::new(),
            waiting: WaitingPool::new(config.event_space),
            running: None,
            root: None,
            top_level: Vec::new(),
            stats: SchedulerStats::default(),
        }
    }

    fn ensure_active(&self) -> SchedResult<()> {
        match self.session {
            Session::Idle => Err(SchedError::NotInitialized),
            Session::Active | Session::ShuttingDown => Ok(()),
        }
    }

    fn check_event(&self, event: EventId) -> SchedResult<()> {
        if event >= self.config.event_space {
            return Err(ArgumentError::Event {
                event,
                event_space: self.config.event_space,
            }
            .into());
        }
        Ok(())
    }

    /// Running task, if the calling thread is that task
    fn running_caller(&self) -> Option<TaskId> {
        let caller = current_task()?;
        (self.running == Some(caller)).then_some(caller)
    }

    fn require_running_caller(&self) -> SchedResult<TaskId> {
        self.running_caller().ok_or(SchedError::NotRunningTask)
    }

    /// Consume one unit of `id`'s quantum
    fn charge(&mut self, id: TaskId) {
        let record = &mut self.tasks[id];
        record.quantum = record.quantum.saturating_sub(1);
    }

    /// Leave the permit unheld because no task is ready
    fn park_permit(&mut self) {
        self.running = None;
        let waiting = self.waiting.len();
        if waiting > 0 {
            warn!(waiting, "no ready task left, permit parked until a host spawn");
        } else {
            debug!("no ready task left");
        }
    }
}

/// Transfer the running permit to `target`
///
/// Called by the running task, or by the host while no task holds the permit.
/// The previous holder gets a fresh quantum. When it is still alive and is not
/// `target`, a running holder becomes ready (a waiting one stays waiting) and
/// the calling thread blocks until a later hand-off names it again.
pub(crate) fn hand_off(core: &mut MutexGuard<'_, Core>, target: Option<TaskId>) {
    let Some(target) = target else {
        return;
    };

    let previous = core.running.replace(target);
    let record = &mut core.tasks[target];
    record.state = TaskState::Running;
    record.wake.notify_one();

    let Some(previous) = previous else {
        core.stats.hand_offs += 1;
        trace!(to = %target, "permit granted");
        return;
    };

    let quantum = core.config.quantum;
    let prev = &mut core.tasks[previous];
    prev.quantum = quantum;
    if previous == target || prev.is_terminated() {
        if previous != target {
            core.stats.hand_offs += 1;
            trace!(from = %previous, to = %target, "permit passed on by terminated task");
        }
        return;
    }

    if prev.state == TaskState::Running {
        prev.state = TaskState::Ready;
    }
    let wake = prev.wake.clone();
    core.stats.hand_offs += 1;
    trace!(from = %previous, to = %target, "hand-off");

    debug_assert_eq!(current_task(), Some(previous), "hand-off from a non-running thread");
    park(core, previous, &wake);
}

/// Block the calling task thread until the permit names `id`
pub(crate) fn park(core: &mut MutexGuard<'_, Core>, id: TaskId, wake: &Condvar) {
    while core.running != Some(id) {
        wake.wait(core);
    }
}

/// Hand off to the next ready task once `id` has used up its quantum
fn yield_if_exhausted(core: &mut MutexGuard<'_, Core>, id: TaskId) {
    if core.tasks[id].quantum == 0 {
        let next = core.ready.select_next();
        trace!(task = %id, next = ?next, "quantum exhausted");
        hand_off(core, next);
    }
}

/// Retire the running task `id` and pass the permit on
///
/// Returns the task's children for its trampoline to reap.
pub(crate) fn terminate(core: &mut MutexGuard<'_, Core>, id: TaskId) -> Vec<TaskId> {
    {
        let Core { tasks, ready, .. } = &mut **core;
        tasks[id].state = TaskState::Terminated;
        ready.remove(tasks, id);
    }
    core.stats.tasks_terminated += 1;
    debug!(task = %id, "task terminated");

    match core.ready.select_next() {
        Some(next) => hand_off(core, Some(next)),
        None => core.park_permit(),
    }

    std::mem::take(&mut core.tasks[id].children)
}

pub(crate) struct Shared {
    pub(crate) core: Mutex<Core>,
}

/// Cooperative priority scheduler
///
/// A cheap, cloneable handle. Each clone refers to the same scheduler, and
/// independent schedulers can coexist in one process. Handlers receive a
/// handle to the scheduler that runs them.
#[derive(Clone)]
pub struct Scheduler {
    pub(crate) shared: Arc<Shared>,
}

impl Scheduler {
    /// Create an uninitialized scheduler
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                core: Mutex::new(Core::new(Session::Idle, SchedulerConfig::default())),
            }),
        }
    }

    /// Start a session with the given quantum and number of events
    pub fn initialize(&self, quantum: u32, event_space: u32) -> SchedResult<()> {
        self.initialize_with(&SchedulerConfig::new(quantum, event_space))
    }

    /// Start a session from a configuration
    pub fn initialize_with(&self, config: &SchedulerConfig) -> SchedResult<()> {
        config.validate()?;

        let mut core = self.shared.core.lock();
        if core.session != Session::Idle {
            return Err(SchedError::AlreadyInitialized);
        }

        *core = Core::new(Session::Active, *config);
        debug!(
            quantum = config.quantum,
            event_space = config.event_space,
            "scheduler initialized"
        );
        Ok(())
    }

    /// Spawn a task running `handler` at `priority`
    ///
    /// From inside a running task the new task becomes its child, costs the
    /// spawner one quantum unit, and preempts the spawner immediately when its
    /// priority is strictly higher. From the host thread the new task is
    /// top-level and is dispatched at once if no task holds the permit.
    pub fn spawn<F>(&self, handler: F, priority: Priority) -> SchedResult<TaskId>
    where
        F: FnOnce(&Scheduler, Priority) + Send + 'static,
    {
        let mut core = self.shared.core.lock();
        let caller = core.running_caller();
        match (core.session, caller) {
            (Session::Active, _) | (Session::ShuttingDown, Some(_)) => {}
            _ => return Err(SchedError::NotInitialized),
        }
        if priority > MAX_PRIORITY {
            return Err(ArgumentError::Priority {
                priority,
                max: MAX_PRIORITY,
            }
            .into());
        }

        let id = TaskId::new();
        let record = TaskRecord::new(id, caller, priority, core.config.quantum);
        let wake = record.wake.clone();
        core.tasks.insert(record);
        core.tasks[id].thread = Some(trampoline::start(self.clone(), id, priority, wake, handler));
        {
            let Core { tasks, ready, .. } = &mut *core;
            ready.insert(tasks, id);
        }
        core.stats.tasks_spawned += 1;
        if core.root.is_none() {
            core.root = Some(id);
        }

        match caller {
            Some(parent) => {
                core.tasks[parent].children.push(id);
                core.charge(parent);
                debug!(task = %id, parent = %parent, priority, "spawned task");

                if priority > core.tasks[parent].priority {
                    debug!(task = %id, preempted = %parent, "higher priority spawn preempts");
                    hand_off(&mut core, Some(id));
                }
                yield_if_exhausted(&mut core, parent);
            }
            None => {
                core.top_level.push(id);
                debug!(task = %id, priority, "spawned top-level task");

                if core.running.is_none() {
                    hand_off(&mut core, Some(id));
                }
            }
        }

        Ok(id)
    }

    /// Block the running task until `event` is signaled
    pub fn wait_for_event(&self, event: EventId) -> SchedResult<()> {
        let mut core = self.shared.core.lock();
        core.ensure_active()?;
        core.check_event(event)?;
        let me = core.require_running_caller()?;

        {
            let Core { tasks, ready, waiting, .. } = &mut *core;
            ready.remove(tasks, me);
            waiting.insert(tasks, me, event);
        }
        debug!(task = %me, event, "waiting for event");

        match core.ready.select_next() {
            Some(next) => hand_off(&mut core, Some(next)),
            None => {
                core.park_permit();
                let wake = core.tasks[me].wake.clone();
                park(&mut core, me, &wake);
            }
        }

        Ok(())
    }

    /// Wake every task waiting on `event`
    ///
    /// Costs the running task one quantum unit. Returns the number of tasks
    /// moved to the ready pool.
    pub fn signal_event(&self, event: EventId) -> SchedResult<usize> {
        let mut core = self.shared.core.lock();
        core.ensure_active()?;
        core.check_event(event)?;
        let me = core.require_running_caller()?;

        core.charge(me);
        let woken = {
            let Core { tasks, ready, waiting, .. } = &mut *core;
            waiting.drain_to_ready(tasks, event, ready)
        };
        core.stats.events_signaled += 1;
        core.stats.tasks_woken += woken as u64;
        debug!(task = %me, event, woken, "signaled event");

        yield_if_exhausted(&mut core, me);
        Ok(woken)
    }

    /// Perform one unit of work in the running task
    pub fn execute_step(&self) -> SchedResult<()> {
        let mut core = self.shared.core.lock();
        core.ensure_active()?;
        let me = core.require_running_caller()?;

        core.charge(me);
        yield_if_exhausted(&mut core, me);
        Ok(())
    }

    /// End the session, blocking until every top-level task has exited
    ///
    /// Each task joins its own children before exiting, so returning from here
    /// means every task thread of the session has been joined.
    pub fn shutdown(&self) -> SchedResult<()> {
        let top_level = {
            let mut core = self.shared.core.lock();
            if let Some(task) = current_task().filter(|&id| core.tasks.contains(id)) {
                return Err(SchedError::ShutdownFromTask(task));
            }
            if core.session != Session::Active {
                return Err(SchedError::NotInitialized);
            }

            core.session = Session::ShuttingDown;
            let ids = core.top_level.clone();
            ids.into_iter()
                .filter_map(|id| core.tasks[id].thread.take().map(|handle| (id, handle)))
                .collect::<Vec<_>>()
        };

        debug!(tasks = top_level.len(), "shutting down, joining top-level tasks");
        for (id, handle) in top_level {
            if handle.join().is_err() {
                warn!(task = %id, "task thread exited abnormally");
            }
            let mut core = self.shared.core.lock();
            core.tasks.release(id);
            core.stats.tasks_joined += 1;
            trace!(task = %id, "top-level task joined");
        }

        let mut core = self.shared.core.lock();
        let leaked = core.tasks.len();
        if leaked > 0 {
            warn!(leaked, "task records left after shutdown");
        }
        let stats = std::mem::take(&mut core.stats);
        let config = core.config;
        *core = Core::new(Session::Idle, config);
        core.stats = stats;
        debug!("scheduler shut down");
        Ok(())
    }

    /// Task bound to the calling thread, if it belongs to this scheduler
    pub fn current_task(&self) -> Option<TaskId> {
        let id = current_task()?;
        self.shared.core.lock().tasks.contains(id).then_some(id)
    }

    /// Holder of the running permit
    pub fn running_task(&self) -> Option<TaskId> {
        self.shared.core.lock().running
    }

    /// First task spawned in the current session
    pub fn root_task(&self) -> Option<TaskId> {
        self.shared.core.lock().root
    }

    /// Whether a session is active
    pub fn is_initialized(&self) -> bool {
        self.shared.core.lock().session == Session::Active
    }

    /// Configuration of the active session
    pub fn config(&self) -> Option<SchedulerConfig> {
        let core = self.shared.core.lock();
        (core.session != Session::Idle).then_some(core.config)
    }

    /// State of a task whose record is still live
    pub fn task_state(&self, id: TaskId) -> Option<TaskState> {
        self.shared.core.lock().tasks.get(id).map(|record| record.state)
    }

    /// Statistics of the current or most recent session
    pub fn stats(&self) -> SchedulerStats {
        self.shared.core.lock().stats.clone()
    }

    /// Consistent copy of every task record and pool bucket
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot::capture(&self.shared.core.lock())
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MAX_EVENT_COUNT;

    #[test]
    fn test_scheduler_creation() {
        let scheduler = Scheduler::new();
        assert!(!scheduler.is_initialized());
        assert!(scheduler.config().is_none());
        assert!(scheduler.running_task().is_none());
        assert!(scheduler.root_task().is_none());
    }

    #[test]
    fn test_initialize_validates_arguments() {
        let scheduler = Scheduler::new();

        assert_eq!(
            scheduler.initialize(0, 1),
            Err(SchedError::InvalidArgument(ArgumentError::Quantum(0)))
        );
        assert!(matches!(
            scheduler.initialize(1, MAX_EVENT_COUNT + 1),
            Err(SchedError::InvalidArgument(ArgumentError::EventSpace { .. }))
        ));
        assert!(!scheduler.is_initialized());

        scheduler.initialize(1, MAX_EVENT_COUNT).unwrap();
        assert!(scheduler.is_initialized());
        assert_eq!(
            scheduler.config(),
            Some(SchedulerConfig::new(1, MAX_EVENT_COUNT))
        );
    }

    #[test]
    fn test_double_initialize() {
        let scheduler = Scheduler::new();
        scheduler.initialize(2, 4).unwrap();
        assert_eq!(scheduler.initialize(2, 4), Err(SchedError::AlreadyInitialized));
        scheduler.shutdown().unwrap();
        assert!(scheduler.initialize(3, 1).is_ok());
        scheduler.shutdown().unwrap();
    }

    #[test]
    fn test_operations_require_session() {
        let scheduler = Scheduler::new();
        assert_eq!(
            scheduler.spawn(|_, _| {}, 0),
            Err(SchedError::NotInitialized)
        );
        assert_eq!(scheduler.execute_step(), Err(SchedError::NotInitialized));
        assert_eq!(scheduler.wait_for_event(0), Err(SchedError::NotInitialized));
        assert_eq!(scheduler.signal_event(0), Err(SchedError::NotInitialized));
        assert_eq!(scheduler.shutdown(), Err(SchedError::NotInitialized));
    }

    #[test]
    fn test_task_operations_from_host_thread() {
        let scheduler = Scheduler::new();
        scheduler.initialize(1, 2).unwrap();

        assert_eq!(scheduler.execute_step(), Err(SchedError::NotRunningTask));
        assert_eq!(scheduler.wait_for_event(1), Err(SchedError::NotRunningTask));
        assert_eq!(scheduler.signal_event(0), Err(SchedError::NotRunningTask));
        assert!(matches!(
            scheduler.signal_event(2),
            Err(SchedError::InvalidArgument(ArgumentError::Event { event: 2, event_space: 2 }))
        ));

        scheduler.shutdown().unwrap();
    }

    #[test]
    fn test_spawn_rejects_priority_above_max() {
        let scheduler = Scheduler::new();
        scheduler.initialize(1, 1).unwrap();

        let result = scheduler.spawn(|_, _| {}, MAX_PRIORITY + 1);
        assert_eq!(
            result,
            Err(SchedError::InvalidArgument(ArgumentError::Priority {
                priority: MAX_PRIORITY + 1,
                max: MAX_PRIORITY,
            }))
        );

        let snapshot = scheduler.snapshot();
        assert!(snapshot.tasks.is_empty());
        assert!(snapshot.ready.iter().all(Vec::is_empty));
        assert_eq!(scheduler.stats().tasks_spawned, 0);

        scheduler.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_without_tasks() {
        let scheduler = Scheduler::new();
        scheduler.initialize(5, 0).unwrap();
        scheduler.shutdown().unwrap();
        assert!(!scheduler.is_initialized());
        assert_eq!(scheduler.stats(), SchedulerStats::default());
    }

    #[test]
    fn test_single_task_lifecycle() {
        let scheduler = Scheduler::new();
        scheduler.initialize(2, 1).unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let id = scheduler
            .spawn(
                move |sched, priority| {
                    let me = sched.current_task();
                    let running = sched.running_task();
                    tx.send((me, running, priority)).unwrap();
                },
                3,
            )
            .unwrap();

        assert_eq!(scheduler.root_task(), Some(id));
        scheduler.shutdown().unwrap();

        let (me, running, priority) = rx.recv().unwrap();
        assert_eq!(me, Some(id));
        assert_eq!(running, Some(id));
        assert_eq!(priority, 3);

        let stats = scheduler.stats();
        assert_eq!(stats.tasks_spawned, 1);
        assert_eq!(stats.tasks_terminated, 1);
        assert_eq!(stats.tasks_joined, 1);
        assert!(scheduler.task_state(id).is_none());
    }
}
