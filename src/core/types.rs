/*!
 * Core Types
 * Common types used across the platform layer
 */

/// Process ID type (observable form; 0 means "not running")
pub type Pid = u32;

/// Caller-chosen tag attached to scheduled tasks; used for bulk cancellation
pub type TaskTag = u64;

/// Worker identifier
pub type WorkerId = u16;

/// Worker id reported when the waiting thread executes a task during a drain
pub const MAIN_THREAD_WORKER_ID: WorkerId = 0;
