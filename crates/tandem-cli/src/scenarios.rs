//! Built-in workloads for `tandem run`
//!
//! Every scenario starts a fresh session, spawns one root task from the host
//! thread and shuts down. Handlers write a journal line whenever they hold the
//! permit, so the journal is the dispatch order.

use anyhow::{bail, Result};
use clap::ValueEnum;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tandem_core::{SchedError, SchedResult, Scheduler, SchedulerConfig, SchedulerStats};
use tracing::{debug, warn};

/// Built-in workload
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Two tasks alternating through a pair of events
    PingPong,
    /// Several waiters released by a single signal
    Broadcast,
    /// Three equal-priority workers sharing the permit
    RoundRobin,
    /// Spawns above and below the spawner's priority
    Preempt,
    /// Root with a two-level tree of children
    Tree,
}

impl Scenario {
    /// Every scenario, in listing order
    pub const ALL: [Scenario; 5] = [
        Scenario::PingPong,
        Scenario::Broadcast,
        Scenario::RoundRobin,
        Scenario::Preempt,
        Scenario::Tree,
    ];

    /// Command-line name
    pub fn name(self) -> &'static str {
        match self {
            Scenario::PingPong => "ping-pong",
            Scenario::Broadcast => "broadcast",
            Scenario::RoundRobin => "round-robin",
            Scenario::Preempt => "preempt",
            Scenario::Tree => "tree",
        }
    }

    /// One-line summary for `tandem scenarios`
    pub fn description(self) -> &'static str {
        match self {
            Scenario::PingPong => "two tasks alternating via two events",
            Scenario::Broadcast => "three waiters released by one signal",
            Scenario::RoundRobin => "three equal-priority workers taking turns",
            Scenario::Preempt => "priority preemption on spawn",
            Scenario::Tree => "root with a two-level child tree",
        }
    }

    /// Smallest event space the workload runs in
    pub fn events_needed(self) -> u32 {
        match self {
            Scenario::PingPong => 2,
            Scenario::Broadcast => 1,
            Scenario::RoundRobin | Scenario::Preempt | Scenario::Tree => 0,
        }
    }

    /// Run the workload to completion in a fresh session
    pub fn run(self, config: &SchedulerConfig) -> Result<Report> {
        if config.event_space < self.events_needed() {
            bail!(
                "scenario {} needs at least {} events, configured {}",
                self.name(),
                self.events_needed(),
                config.event_space
            );
        }

        let scheduler = Scheduler::new();
        scheduler.initialize_with(config)?;
        debug!(scenario = self.name(), "starting scenario");

        let recorder = Arc::new(Recorder::default());
        let spawned = match self {
            Scenario::PingPong => ping_pong(&scheduler, &recorder),
            Scenario::Broadcast => broadcast(&scheduler, &recorder),
            Scenario::RoundRobin => round_robin(&scheduler, &recorder),
            Scenario::Preempt => preempt(&scheduler, &recorder),
            Scenario::Tree => tree(&scheduler, &recorder),
        };
        scheduler.shutdown()?;
        spawned?;

        let failures = std::mem::take(&mut *recorder.failures.lock());
        if let Some(first) = failures.first() {
            bail!(
                "{} scheduler call(s) failed inside tasks, first: {}",
                failures.len(),
                first
            );
        }

        let journal = std::mem::take(&mut *recorder.journal.lock());
        Ok(Report {
            scenario: self,
            config: *config,
            journal,
            stats: scheduler.stats(),
        })
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one scenario run
#[derive(Debug, Clone)]
pub struct Report {
    /// Workload that ran
    pub scenario: Scenario,
    /// Session configuration it ran with
    pub config: SchedulerConfig,
    /// Journal lines in dispatch order, each prefixed with the writing task
    pub journal: Vec<String>,
    /// Statistics of the session
    pub stats: SchedulerStats,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "scenario {} (quantum {}, events {})",
            self.scenario, self.config.quantum, self.config.event_space
        )?;
        for (n, line) in self.journal.iter().enumerate() {
            writeln!(f, "{:>4}  {}", n + 1, line)?;
        }
        let stats = &self.stats;
        write!(
            f,
            "spawned {}, terminated {}, joined {}, hand-offs {}, signals {}, woken {}, panics {}",
            stats.tasks_spawned,
            stats.tasks_terminated,
            stats.tasks_joined,
            stats.hand_offs,
            stats.events_signaled,
            stats.tasks_woken,
            stats.handler_panics
        )
    }
}

/// Journal and error sink shared by the handlers of one run
#[derive(Default)]
struct Recorder {
    journal: Mutex<Vec<String>>,
    failures: Mutex<Vec<SchedError>>,
}

impl Recorder {
    fn note(&self, sched: &Scheduler, message: impl fmt::Display) {
        let task = sched
            .current_task()
            .map_or_else(|| "host".to_string(), |id| id.to_string());
        self.journal.lock().push(format!("{:<8} {}", task, message));
    }

    /// Keep the value of a scheduler call, or record its error
    fn check<T>(&self, result: SchedResult<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "scheduler call failed inside task");
                self.failures.lock().push(e);
                None
            }
        }
    }
}

// Events used by ping-pong
const TO_PONG: u32 = 0;
const TO_PING: u32 = 1;
const RALLIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Turn {
    Ping,
    Pong,
}

fn ping_pong(scheduler: &Scheduler, recorder: &Arc<Recorder>) -> SchedResult<()> {
    // the turn flag covers a signal that lands before its partner waits
    let turn = Arc::new(Mutex::new(Turn::Ping));
    let (rec, turn_ping) = (recorder.clone(), turn.clone());

    scheduler.spawn(
        move |sched, _| {
            let (rec_pong, turn_pong) = (rec.clone(), turn_ping.clone());
            let pong = sched.spawn(
                move |sched, _| {
                    for rally in 0..RALLIES {
                        while *turn_pong.lock() != Turn::Pong {
                            if rec_pong.check(sched.wait_for_event(TO_PONG)).is_none() {
                                return;
                            }
                        }
                        rec_pong.note(sched, format_args!("pong {}", rally));
                        *turn_pong.lock() = Turn::Ping;
                        rec_pong.check(sched.signal_event(TO_PING));
                    }
                },
                1,
            );
            if rec.check(pong).is_none() {
                return;
            }

            for rally in 0..RALLIES {
                rec.note(sched, format_args!("ping {}", rally));
                *turn_ping.lock() = Turn::Pong;
                rec.check(sched.signal_event(TO_PONG));
                while *turn_ping.lock() != Turn::Ping {
                    if rec.check(sched.wait_for_event(TO_PING)).is_none() {
                        return;
                    }
                }
            }
        },
        1,
    )?;
    Ok(())
}

const WAITERS: usize = 3;

fn broadcast(scheduler: &Scheduler, recorder: &Arc<Recorder>) -> SchedResult<()> {
    let rec = recorder.clone();

    scheduler.spawn(
        move |sched, _| {
            // waiters outrank the root, so each one is parked before the signal
            for n in 0..WAITERS {
                let rec_waiter = rec.clone();
                rec.check(sched.spawn(
                    move |sched, _| {
                        rec_waiter.note(sched, format_args!("waiter {} waiting", n));
                        if rec_waiter.check(sched.wait_for_event(0)).is_some() {
                            rec_waiter.note(sched, format_args!("waiter {} released", n));
                        }
                    },
                    1,
                ));
            }

            if let Some(released) = rec.check(sched.signal_event(0)) {
                rec.note(sched, format_args!("signal released {} waiters", released));
            }
        },
        0,
    )?;
    Ok(())
}

const STEPS: u32 = 3;

fn round_robin(scheduler: &Scheduler, recorder: &Arc<Recorder>) -> SchedResult<()> {
    let rec = recorder.clone();

    scheduler.spawn(
        move |sched, _| {
            for name in ["A", "B", "C"] {
                let rec_worker = rec.clone();
                rec.check(sched.spawn(
                    move |sched, _| {
                        for step in 0..STEPS {
                            rec_worker.note(sched, format_args!("worker {} step {}", name, step));
                            if rec_worker.check(sched.execute_step()).is_none() {
                                return;
                            }
                        }
                    },
                    0,
                ));
            }
            rec.note(sched, "root done spawning");
        },
        1,
    )?;
    Ok(())
}

fn preempt(scheduler: &Scheduler, recorder: &Arc<Recorder>) -> SchedResult<()> {
    let rec = recorder.clone();

    scheduler.spawn(
        move |sched, priority| {
            rec.note(sched, format_args!("root started at priority {}", priority));
            for child_priority in [priority - 1, priority + 3] {
                let rec_child = rec.clone();
                rec.check(sched.spawn(
                    move |sched, priority| {
                        rec_child.note(sched, format_args!("child at priority {}", priority));
                    },
                    child_priority,
                ));
                rec.note(sched, format_args!("root resumed after spawn at {}", child_priority));
            }
        },
        1,
    )?;
    Ok(())
}

const FAN_OUT: usize = 2;

fn tree(scheduler: &Scheduler, recorder: &Arc<Recorder>) -> SchedResult<()> {
    let rec = recorder.clone();

    scheduler.spawn(
        move |sched, _| {
            rec.note(sched, "root");
            for i in 0..FAN_OUT {
                let rec_child = rec.clone();
                rec.check(sched.spawn(
                    move |sched, _| {
                        rec_child.note(sched, format_args!("child {}", i));
                        for j in 0..FAN_OUT {
                            let rec_leaf = rec_child.clone();
                            rec_child.check(sched.spawn(
                                move |sched, _| {
                                    rec_leaf.note(sched, format_args!("grandchild {}.{}", i, j));
                                },
                                2,
                            ));
                        }
                    },
                    1,
                ));
            }
        },
        0,
    )?;
    Ok(())
}
