/*!
 * Scheduler Types
 * Priorities and the completion-tracking Schedule
 */

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Dispatch priority. High is strictly preferred over Normal; within one
/// priority tasks run FIFO by enqueue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Normal,
}

struct ScheduleState {
    counter: AtomicI32,
    lock: Mutex<()>,
    done: Condvar,
}

/// Completion group for a caller-defined set of task submissions.
///
/// Submission increments the counter; completion or cancellation decrements
/// it. The transition to zero wakes every waiter. A Schedule is reusable
/// once it has reached zero. Handles are cheap clones sharing one counter.
#[derive(Clone)]
pub struct Schedule {
    state: Arc<ScheduleState>,
}

impl Schedule {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ScheduleState {
                counter: AtomicI32::new(0),
                lock: Mutex::new(()),
                done: Condvar::new(),
            }),
        }
    }

    /// Number of submissions not yet completed or cancelled
    pub fn pending(&self) -> i32 {
        self.state.counter.load(Ordering::SeqCst)
    }

    pub(crate) fn register(&self) {
        self.state.counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Completion edge: decrement, and on the transition to zero wake all
    /// waiters. The lock round-trip orders the wake against a waiter that
    /// has checked the counter but not yet parked.
    pub(crate) fn complete(&self) {
        if self.state.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _guard = self.state.lock.lock();
            self.state.done.notify_all();
        }
    }

    /// Park until the zero transition is signalled. Returns immediately if
    /// the counter is already zero; spurious wakeups are benign because
    /// callers re-check `pending`.
    pub(crate) fn wait_pending(&self) {
        let mut guard = self.state.lock.lock();
        if self.state.counter.load(Ordering::SeqCst) > 0 {
            self.state.done.wait(&mut guard);
        }
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}
