/*!
 * File Types
 * Access/mode enums and the native handle alias
 */

use serde::{Deserialize, Serialize};

/// Native file handle: a raw descriptor on POSIX, a `HANDLE` on Windows
#[cfg(unix)]
pub type NativeFileHandle = std::os::unix::io::RawFd;

#[cfg(windows)]
pub type NativeFileHandle = winapi::um::winnt::HANDLE;

/// Sentinel for "no handle"
#[cfg(unix)]
pub const INVALID_FILE_HANDLE: NativeFileHandle = -1;

#[cfg(windows)]
pub const INVALID_FILE_HANDLE: NativeFileHandle = winapi::um::handleapi::INVALID_HANDLE_VALUE;

/// Requested access for a native open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileAccess {
    /// Read-only
    Read,
    /// Write-only
    Write,
    /// Read and write
    ReadWrite,
}

/// Open disposition for a native open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileMode {
    /// Fails if the file doesn't exist
    OpenExisting,
    /// Opens if it exists, creates if not
    OpenAlways,
    /// Fails if the file exists
    CreateNew,
    /// Truncates an existing file, creates otherwise
    CreateAlways,
    /// Opens an existing file and clears it; fails if missing
    TruncateExisting,
}
