/*!
 * Core Module
 * Error types and shared aliases
 */

pub mod errors;
pub mod types;

pub use errors::{
    FileError, FileResult, PlatformError, ProcessError, ProcessResult, Result, SchedulerError,
    SchedulerResult,
};
pub use types::{Pid, TaskTag, WorkerId, MAIN_THREAD_WORKER_ID};
