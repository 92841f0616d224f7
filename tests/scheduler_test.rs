/*!
 * Scheduler Tests
 * Pool lifecycle, completion tracking, priorities, cancellation and drain
 */

use platform_ops::{
    cancel_tasks_of_tag, get_worker_count, initialize_scheduler, run_task, schedule_task,
    terminate_scheduler, wait_for_schedule_completion, Priority, Schedule, MAIN_THREAD_WORKER_ID,
};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU16, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

/// Tears the pool down even when an assertion fails mid-test
struct PoolGuard;

impl PoolGuard {
    fn new(workers: u8) -> Self {
        initialize_scheduler(workers).unwrap();
        PoolGuard
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        terminate_scheduler();
    }
}

#[test]
#[serial]
fn test_initialization_cycle() {
    terminate_scheduler();

    initialize_scheduler(4).unwrap();
    assert_eq!(get_worker_count(), 4);
    terminate_scheduler();
    assert_eq!(get_worker_count(), 0);

    initialize_scheduler(1).unwrap();
    assert_eq!(get_worker_count(), 1);
    terminate_scheduler();
}

#[test]
#[serial]
fn test_default_worker_count() {
    terminate_scheduler();

    initialize_scheduler(0).unwrap();
    let count = get_worker_count();
    assert!(count >= 2);
    assert!(count <= 255);
    terminate_scheduler();
}

#[test]
#[serial]
fn test_basic_execution() {
    let _pool = PoolGuard::new(2);

    let schedule = Schedule::new();
    let run_count = Arc::new(AtomicI32::new(0));

    let counter = Arc::clone(&run_count);
    schedule_task(
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        0,
        &schedule,
        Priority::Normal,
    );

    wait_for_schedule_completion(&schedule);

    assert_eq!(run_count.load(Ordering::SeqCst), 1);
    assert_eq!(schedule.pending(), 0);
}

#[test]
#[serial]
fn test_hundred_concurrent_tasks() {
    let _pool = PoolGuard::new(4);

    let schedule = Schedule::new();
    let run_count = Arc::new(AtomicI32::new(0));
    let total = 100;

    for _ in 0..total {
        let counter = Arc::clone(&run_count);
        schedule_task(
            move |_| {
                thread::sleep(Duration::from_micros(10));
                counter.fetch_add(1, Ordering::SeqCst);
            },
            0,
            &schedule,
            Priority::Normal,
        );
    }

    wait_for_schedule_completion(&schedule);

    assert_eq!(run_count.load(Ordering::SeqCst), total);
    assert_eq!(schedule.pending(), 0);
}

#[test]
#[serial]
fn test_both_priorities_run_once() {
    let _pool = PoolGuard::new(2);

    let schedule = Schedule::new();
    let high_ran = Arc::new(AtomicI32::new(0));
    let normal_ran = Arc::new(AtomicI32::new(0));

    let high = Arc::clone(&high_ran);
    schedule_task(
        move |_| {
            high.fetch_add(1, Ordering::SeqCst);
        },
        0,
        &schedule,
        Priority::High,
    );

    let normal = Arc::clone(&normal_ran);
    schedule_task(
        move |_| {
            normal.fetch_add(1, Ordering::SeqCst);
        },
        0,
        &schedule,
        Priority::Normal,
    );

    wait_for_schedule_completion(&schedule);

    assert_eq!(high_ran.load(Ordering::SeqCst), 1);
    assert_eq!(normal_ran.load(Ordering::SeqCst), 1);
}

/// With the single worker parked on a gate task, queued high-priority
/// tasks must dispatch before earlier-queued normal ones, FIFO within
/// each priority.
#[test]
#[serial]
fn test_strict_priority_and_fifo_order() {
    let _pool = PoolGuard::new(1);

    let gate_schedule = Schedule::new();
    let schedule = Schedule::new();
    let gate = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::channel::<(Priority, i32)>();

    let gate_flag = Arc::clone(&gate);
    schedule_task(
        move |_| {
            for _ in 0..10_000 {
                if gate_flag.load(Ordering::SeqCst) {
                    break;
                }
                thread::sleep(Duration::from_millis(1));
            }
        },
        0,
        &gate_schedule,
        Priority::Normal,
    );

    // Let the worker take the gate task before queueing the rest
    thread::sleep(Duration::from_millis(50));

    for i in 0..3 {
        let sender = tx.clone();
        schedule_task(
            move |_| {
                sender.send((Priority::Normal, i)).unwrap();
            },
            0,
            &schedule,
            Priority::Normal,
        );
    }
    for i in 0..2 {
        let sender = tx.clone();
        schedule_task(
            move |_| {
                sender.send((Priority::High, i)).unwrap();
            },
            0,
            &schedule,
            Priority::High,
        );
    }

    gate.store(true, Ordering::SeqCst);

    let mut observed = Vec::new();
    for _ in 0..5 {
        observed.push(rx.recv_timeout(Duration::from_secs(5)).unwrap());
    }

    wait_for_schedule_completion(&gate_schedule);
    wait_for_schedule_completion(&schedule);

    assert_eq!(
        observed,
        vec![
            (Priority::High, 0),
            (Priority::High, 1),
            (Priority::Normal, 0),
            (Priority::Normal, 1),
            (Priority::Normal, 2),
        ]
    );
}

/// The waiting thread pitches in under WorkerId 0 while the only worker
/// is busy.
#[test]
#[serial]
fn test_drain_runs_on_main_thread() {
    let _pool = PoolGuard::new(1);

    let gate_schedule = Schedule::new();
    let schedule = Schedule::new();
    let gate = Arc::new(AtomicBool::new(false));
    let drained_by = Arc::new(AtomicU16::new(u16::MAX));

    let gate_flag = Arc::clone(&gate);
    schedule_task(
        move |_| {
            for _ in 0..10_000 {
                if gate_flag.load(Ordering::SeqCst) {
                    break;
                }
                thread::sleep(Duration::from_millis(1));
            }
        },
        0,
        &gate_schedule,
        Priority::Normal,
    );

    thread::sleep(Duration::from_millis(50));

    let recorder = Arc::clone(&drained_by);
    schedule_task(
        move |worker_id| {
            recorder.store(worker_id, Ordering::SeqCst);
        },
        0,
        &schedule,
        Priority::Normal,
    );

    // The worker is parked on the gate, so the drain must execute this
    wait_for_schedule_completion(&schedule);
    assert_eq!(drained_by.load(Ordering::SeqCst), MAIN_THREAD_WORKER_ID);

    gate.store(true, Ordering::SeqCst);
    wait_for_schedule_completion(&gate_schedule);
}

#[test]
#[serial]
fn test_run_task_fire_and_forget() {
    let _pool = PoolGuard::new(2);

    let executed = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&executed);
    run_task(move || {
        flag.store(true, Ordering::SeqCst);
    });

    for _ in 0..100 {
        if executed.load(Ordering::SeqCst) {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }

    assert!(executed.load(Ordering::SeqCst));
}

#[test]
#[serial]
fn test_cancellation_of_queued_tasks() {
    let _pool = PoolGuard::new(1);

    let gate_schedule = Schedule::new();
    let schedule = Schedule::new();
    let gate = Arc::new(AtomicBool::new(false));
    let doomed_ran = Arc::new(AtomicI32::new(0));
    let kept_ran = Arc::new(AtomicI32::new(0));

    let gate_flag = Arc::clone(&gate);
    schedule_task(
        move |_| {
            for _ in 0..10_000 {
                if gate_flag.load(Ordering::SeqCst) {
                    break;
                }
                thread::sleep(Duration::from_millis(1));
            }
        },
        0,
        &gate_schedule,
        Priority::Normal,
    );

    thread::sleep(Duration::from_millis(50));

    for _ in 0..3 {
        let counter = Arc::clone(&doomed_ran);
        schedule_task(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            7,
            &schedule,
            Priority::Normal,
        );
    }
    for _ in 0..2 {
        let counter = Arc::clone(&kept_ran);
        schedule_task(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            8,
            &schedule,
            Priority::High,
        );
    }
    assert_eq!(schedule.pending(), 5);

    cancel_tasks_of_tag(7);
    assert_eq!(schedule.pending(), 2);

    gate.store(true, Ordering::SeqCst);
    wait_for_schedule_completion(&schedule);
    wait_for_schedule_completion(&gate_schedule);

    assert_eq!(doomed_ran.load(Ordering::SeqCst), 0);
    assert_eq!(kept_ran.load(Ordering::SeqCst), 2);
    assert_eq!(schedule.pending(), 0);
}

#[test]
#[serial]
fn test_cancel_unknown_tag_is_noop() {
    let _pool = PoolGuard::new(2);

    cancel_tasks_of_tag(999);

    let schedule = Schedule::new();
    let counter = Arc::new(AtomicI32::new(0));
    let count = Arc::clone(&counter);
    schedule_task(
        move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        },
        10,
        &schedule,
        Priority::Normal,
    );

    wait_for_schedule_completion(&schedule);
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    // Cancelling after completion must not disturb the settled counter
    cancel_tasks_of_tag(10);
    assert_eq!(schedule.pending(), 0);
}

#[test]
#[serial]
fn test_schedule_reuse_across_batches() {
    let _pool = PoolGuard::new(2);

    let schedule = Schedule::new();
    let counter = Arc::new(AtomicI32::new(0));

    for _ in 0..2 {
        for _ in 0..10 {
            let count = Arc::clone(&counter);
            schedule_task(
                move |_| {
                    count.fetch_add(1, Ordering::SeqCst);
                },
                0,
                &schedule,
                Priority::Normal,
            );
        }
        wait_for_schedule_completion(&schedule);
        assert_eq!(schedule.pending(), 0);
    }

    assert_eq!(counter.load(Ordering::SeqCst), 20);
}
