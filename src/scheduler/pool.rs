/*!
 * Worker Pool
 * Fixed pool draining two FIFO queues with strict priority, tagged
 * cancellation and a caller-assisted drain while waiting
 */

use super::types::{Priority, Schedule};
use crate::core::errors::{SchedulerError, SchedulerResult};
use crate::core::types::{TaskTag, WorkerId, MAIN_THREAD_WORKER_ID};
use log::{debug, info, trace};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::thread::{self, JoinHandle};

type TaskFn = Box<dyn FnOnce(WorkerId) + Send + 'static>;

struct ScheduledTask {
    tag: TaskTag,
    schedule: Schedule,
    work: TaskFn,
}

struct TaskQueues {
    high: VecDeque<ScheduledTask>,
    normal: VecDeque<ScheduledTask>,
}

impl TaskQueues {
    const fn new() -> Self {
        Self {
            high: VecDeque::new(),
            normal: VecDeque::new(),
        }
    }

    /// High strictly before Normal, FIFO within each
    fn pop_next(&mut self) -> Option<ScheduledTask> {
        if let Some(task) = self.high.pop_front() {
            return Some(task);
        }
        self.normal.pop_front()
    }
}

/// Process-wide scheduler state. Const-initialized so there is no teardown
/// ordering to get wrong; `initialize_scheduler`/`terminate_scheduler`
/// control only the worker threads.
struct SchedulerCore {
    queues: Mutex<TaskQueues>,
    wake: Condvar,
    workers: Mutex<Vec<JoinHandle<()>>>,
    stop: AtomicBool,
    worker_count: AtomicU16,
}

static SCHEDULER: SchedulerCore = SchedulerCore {
    queues: Mutex::new(TaskQueues::new()),
    wake: Condvar::new(),
    workers: Mutex::new(Vec::new()),
    stop: AtomicBool::new(false),
    worker_count: AtomicU16::new(0),
};

/// Spawn the worker pool.
///
/// `worker_count == 0` selects `max(2, hardware_concurrency - 2)`, capped
/// at 255. Workers receive ids `1..=N`. May be called again after
/// `terminate_scheduler`.
pub fn initialize_scheduler(worker_count: u8) -> SchedulerResult<()> {
    let count = effective_worker_count(worker_count);

    let mut workers = SCHEDULER.workers.lock();
    for i in 0..count {
        let worker_id = i + 1;
        let spawned = thread::Builder::new()
            .name(format!("sched-worker-{}", worker_id))
            .spawn(move || worker_loop(worker_id));
        match spawned {
            Ok(handle) => workers.push(handle),
            Err(e) => {
                SCHEDULER
                    .worker_count
                    .store(workers.len() as u16, Ordering::SeqCst);
                return Err(SchedulerError::WorkerSpawnFailed(e.to_string()));
            }
        }
    }

    SCHEDULER
        .worker_count
        .store(workers.len() as u16, Ordering::SeqCst);
    info!("scheduler initialized with {} workers", workers.len());
    Ok(())
}

fn effective_worker_count(requested: u8) -> WorkerId {
    if requested != 0 {
        return requested as WorkerId;
    }

    let hw = thread::available_parallelism()
        .map(|n| n.get() as u32)
        .unwrap_or(0);
    let threads = if hw > 2 { hw - 2 } else { 2 };
    threads.min(255) as WorkerId
}

/// Stop and join every worker. Queued tasks are drained to empty before
/// the workers exit.
pub fn terminate_scheduler() {
    let mut workers = SCHEDULER.workers.lock();

    {
        let _queues = SCHEDULER.queues.lock();
        SCHEDULER.stop.store(true, Ordering::SeqCst);
    }
    SCHEDULER.wake.notify_all();

    for handle in workers.drain(..) {
        let _ = handle.join();
    }

    SCHEDULER.stop.store(false, Ordering::SeqCst);
    SCHEDULER.worker_count.store(0, Ordering::SeqCst);
    info!("scheduler terminated");
}

/// Workers currently in the pool
pub fn get_worker_count() -> WorkerId {
    SCHEDULER.worker_count.load(Ordering::SeqCst)
}

/// Submit a task against a Schedule.
///
/// The Schedule counter is incremented before the task is queued; exactly
/// one completion edge follows, from execution or cancellation. Panics if
/// the pool has not been initialized.
pub fn schedule_task<F>(work: F, tag: TaskTag, schedule: &Schedule, priority: Priority)
where
    F: FnOnce(WorkerId) + Send + 'static,
{
    assert!(
        get_worker_count() > 0,
        "scheduler must be initialized before calling schedule_task"
    );

    schedule.register();
    {
        let mut queues = SCHEDULER.queues.lock();
        let task = ScheduledTask {
            tag,
            schedule: schedule.clone(),
            work: Box::new(work),
        };
        match priority {
            Priority::High => queues.high.push_back(task),
            Priority::Normal => queues.normal.push_back(task),
        }
    }
    SCHEDULER.wake.notify_one();
}

/// Remove every still-queued task carrying `tag`, performing each one's
/// completion edge. Tasks already picked up by a worker run to completion.
pub fn cancel_tasks_of_tag(tag: TaskTag) {
    let mut queues = SCHEDULER.queues.lock();
    let queues = &mut *queues;
    let mut cancelled = 0usize;

    for queue in [&mut queues.high, &mut queues.normal] {
        queue.retain(|task| {
            if task.tag == tag {
                task.schedule.complete();
                cancelled += 1;
                false
            } else {
                true
            }
        });
    }

    if cancelled > 0 {
        debug!("cancelled {} queued tasks with tag {}", cancelled, tag);
    }
}

/// Block until the Schedule's counter reaches zero, executing queued tasks
/// on the calling thread (as `WorkerId` 0) while waiting.
pub fn wait_for_schedule_completion(schedule: &Schedule) {
    assert!(
        get_worker_count() > 0,
        "scheduler must be initialized before calling wait_for_schedule_completion"
    );

    while schedule.pending() > 0 {
        let task = SCHEDULER.queues.lock().pop_next();
        match task {
            Some(task) => {
                (task.work)(MAIN_THREAD_WORKER_ID);
                task.schedule.complete();
            }
            None => schedule.wait_pending(),
        }
    }
}

/// Run a one-shot closure on a fresh detached thread, outside the pool and
/// any Schedule.
pub fn run_task<F>(work: F)
where
    F: FnOnce() + Send + 'static,
{
    thread::spawn(work);
}

fn worker_loop(worker_id: WorkerId) {
    trace!("worker {} started", worker_id);
    loop {
        let task = {
            let mut queues = SCHEDULER.queues.lock();
            loop {
                if let Some(task) = queues.pop_next() {
                    break Some(task);
                }
                if SCHEDULER.stop.load(Ordering::SeqCst) {
                    break None;
                }
                SCHEDULER.wake.wait(&mut queues);
            }
        };

        match task {
            Some(task) => {
                (task.work)(worker_id);
                task.schedule.complete();
            }
            None => {
                trace!("worker {} exiting", worker_id);
                return;
            }
        }
    }
}
