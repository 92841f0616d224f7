/*!
 * Scheduler Module
 * Tagged, priority-aware work scheduling over a fixed worker pool
 */

pub mod pool;
pub mod types;

pub use pool::{
    cancel_tasks_of_tag, get_worker_count, initialize_scheduler, run_task, schedule_task,
    terminate_scheduler, wait_for_schedule_completion,
};
pub use types::{Priority, Schedule};
