/*!
 * Platform Ops
 * Cross-platform OS abstraction layer: a tagged, priority-aware work
 * scheduler with cooperative drain, a unified file mapping and shared
 * memory subsystem, and a line-capturing child process supervisor
 */

pub mod core;
pub mod fs;
pub mod mmap;
pub mod process;
pub mod scheduler;

pub use crate::core::errors::{
    FileError, FileResult, PlatformError, ProcessError, ProcessResult, Result, SchedulerError,
    SchedulerResult,
};
pub use crate::core::types::{Pid, TaskTag, WorkerId, MAIN_THREAD_WORKER_ID};
pub use crate::fs::{
    native_close_file, native_open_file, normalize_executable_path, read_binary_file,
    read_text_file, write_binary_file, write_text_file, FileAccess, FileMode, NativeFileHandle,
    INVALID_FILE_HANDLE,
};
pub use crate::mmap::{
    map_file, map_shared_memory, unlink_shared_memory, unmap_file, MappedRegion,
};
pub use crate::process::{
    current_pid, spawn_process_async, spawn_process_sync, terminate_process, LineBuffer,
    ProcessHandle,
};
pub use crate::scheduler::{
    cancel_tasks_of_tag, get_worker_count, initialize_scheduler, run_task, schedule_task,
    terminate_scheduler, wait_for_schedule_completion, Priority, Schedule,
};
