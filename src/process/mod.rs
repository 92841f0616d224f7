/*!
 * Process Module
 * Child process spawning with line-framed output capture
 */

pub mod line_buffer;
pub mod supervisor;
pub mod types;

pub use line_buffer::LineBuffer;
pub use supervisor::{
    current_pid, spawn_process_async, spawn_process_sync, terminate_process,
};
pub use types::ProcessHandle;
