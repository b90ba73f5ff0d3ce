use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tandem_core::Scheduler;

/// Two equal-priority tasks with quantum 1: every step passes the permit
fn run_step_rotation(scheduler: &Scheduler, steps: u64) {
    scheduler.initialize(1, 1).unwrap();
    scheduler
        .spawn(
            move |sched, _| {
                for _ in 0..2 {
                    sched
                        .spawn(
                            move |sched, _| {
                                for _ in 0..steps {
                                    sched.execute_step().unwrap();
                                }
                            },
                            0,
                        )
                        .unwrap();
                }
            },
            1,
        )
        .unwrap();
    scheduler.shutdown().unwrap();
}

/// Two tasks taking turns through a pair of events; the higher-priority
/// partner is waiting on event 0 before the first signal
fn run_ping_pong(scheduler: &Scheduler, rounds: u64) {
    scheduler.initialize(u32::MAX, 2).unwrap();
    scheduler
        .spawn(
            move |sched, _| {
                sched
                    .spawn(
                        move |sched, _| {
                            for _ in 0..rounds {
                                sched.wait_for_event(0).unwrap();
                                sched.signal_event(1).unwrap();
                            }
                        },
                        2,
                    )
                    .unwrap();
                for _ in 0..rounds {
                    sched.signal_event(0).unwrap();
                    sched.wait_for_event(1).unwrap();
                }
            },
            1,
        )
        .unwrap();
    scheduler.shutdown().unwrap();
}

fn bench_step_rotation(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_rotation");
    let scheduler = Scheduler::new();

    for steps in [100u64, 1_000] {
        group.throughput(Throughput::Elements(steps * 2));
        group.bench_with_input(BenchmarkId::from_parameter(steps), &steps, |b, &steps| {
            b.iter(|| run_step_rotation(&scheduler, black_box(steps)));
        });
    }

    group.finish();
}

fn bench_ping_pong(c: &mut Criterion) {
    let mut group = c.benchmark_group("ping_pong");
    let scheduler = Scheduler::new();

    for rounds in [100u64, 1_000] {
        group.throughput(Throughput::Elements(rounds * 2));
        group.bench_with_input(BenchmarkId::from_parameter(rounds), &rounds, |b, &rounds| {
            b.iter(|| run_ping_pong(&scheduler, black_box(rounds)));
        });
    }

    group.finish();
}

fn bench_spawn(c: &mut Criterion) {
    let scheduler = Scheduler::new();

    c.bench_function("spawn_and_join_16", |b| {
        b.iter(|| {
            scheduler.initialize(4, 1).unwrap();
            scheduler
                .spawn(
                    |sched, _| {
                        for _ in 0..16 {
                            sched.spawn(|_, _| {}, 0).unwrap();
                        }
                    },
                    0,
                )
                .unwrap();
            scheduler.shutdown().unwrap();
        });
    });
}

criterion_group!(benches, bench_step_rotation, bench_ping_pong, bench_spawn);
criterion_main!(benches);
