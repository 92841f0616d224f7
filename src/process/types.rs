/*!
 * Process Types
 * Observable state for asynchronously spawned children
 */

use crate::core::types::Pid;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// State shared between a `ProcessHandle` and its supervising thread.
///
/// The supervisor stores the PID before the child produces output and
/// clears it after the wait completes; `running` is flipped false after the
/// spawn logic returns. `is_active` reads both fields without a combined
/// load, which is safe under that write ordering.
pub(crate) struct SharedProcessState {
    pub id: AtomicU32,
    pub running: AtomicBool,
}

impl SharedProcessState {
    pub fn new() -> Self {
        Self {
            id: AtomicU32::new(0),
            running: AtomicBool::new(false),
        }
    }
}

/// Move-only handle to an asynchronously spawned child process.
///
/// Dropping the handle joins the supervising thread, i.e. waits for the
/// child to exit and the finish callback to run. Use
/// [`terminate_process`](super::terminate_process) first to kill a
/// long-running child.
pub struct ProcessHandle {
    state: Arc<SharedProcessState>,
    supervisor: Option<JoinHandle<()>>,
}

impl ProcessHandle {
    pub(crate) fn new(state: Arc<SharedProcessState>, supervisor: JoinHandle<()>) -> Self {
        Self {
            state,
            supervisor: Some(supervisor),
        }
    }

    /// The child's native PID; 0 when not running
    pub fn pid(&self) -> Pid {
        self.state.id.load(Ordering::SeqCst)
    }

    /// Whether the supervising thread is still running the child
    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Active means running with a known PID
    pub fn is_active(&self) -> bool {
        self.is_running() && self.pid() != 0
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if let Some(handle) = self.supervisor.take() {
            let _ = handle.join();
        }
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid())
            .field("is_running", &self.is_running())
            .finish()
    }
}
