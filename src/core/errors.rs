/*!
 * Error Types
 * Centralized error handling with thiserror and serde support
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File, mapping and shared-memory errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum FileError {
    #[error("Failed to open file: {0}")]
    Open(String),

    #[error("Failed to open file '{0}': {1}")]
    NativeOpen(String, String),

    #[error("File already exists: {0}")]
    AlreadyExists(String),

    #[error("Failed to write to file: {0}")]
    Write(String),

    #[error("Failed to get size of {0}: {1}")]
    Size(String, String),

    #[error("Cannot map empty file: {0}")]
    EmptyFile(String),

    #[error("Memory mapping failed: {0}")]
    MapFailed(String),

    #[error("Shared memory failure: {0}")]
    ShmFailed(String),
}

/// Child process errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ProcessError {
    #[error("Failed to create pipe: {0}")]
    PipeFailed(String),

    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Not supported on this platform: {0}")]
    NotSupported(String),
}

/// Scheduler errors with serialization support
///
/// The scheduler only reports errors during initialization; submitting or
/// waiting against an uninitialized pool is a programmer error and asserts.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SchedulerError {
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawnFailed(String),
}

/// Unified platform error type
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("File error: {0}")]
    File(#[from] FileError),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Implement conversion from std::io::Error
impl From<std::io::Error> for PlatformError {
    fn from(err: std::io::Error) -> Self {
        PlatformError::Io(err.to_string())
    }
}

// Implement conversion from String for convenience
impl From<String> for PlatformError {
    fn from(msg: String) -> Self {
        PlatformError::Internal(msg)
    }
}

/// Result type for file and mapping operations
pub type FileResult<T> = std::result::Result<T, FileError>;

/// Result type for process operations
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;

/// Result type for scheduler operations
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

/// Result type for platform operations
pub type Result<T> = std::result::Result<T, PlatformError>;
