/*!
 * Native File Handles
 * Open/close with explicit access and disposition control
 */

use super::types::{FileAccess, FileMode, NativeFileHandle, INVALID_FILE_HANDLE};
use crate::core::errors::{FileError, FileResult};
use log::trace;
use std::path::Path;

/// Open a file with an explicit access/disposition pair, returning the
/// native handle. `permissions` is a POSIX mode; ignored on Windows.
#[cfg(unix)]
pub fn native_open_file(
    path: &Path,
    access: FileAccess,
    mode: FileMode,
    permissions: u32,
) -> FileResult<NativeFileHandle> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let mut flags = match access {
        FileAccess::Read => libc::O_RDONLY,
        FileAccess::Write => libc::O_WRONLY,
        FileAccess::ReadWrite => libc::O_RDWR,
    };

    flags |= match mode {
        FileMode::OpenExisting => 0,
        FileMode::OpenAlways => libc::O_CREAT,
        FileMode::CreateNew => libc::O_CREAT | libc::O_EXCL,
        FileMode::CreateAlways => libc::O_CREAT | libc::O_TRUNC,
        FileMode::TruncateExisting => libc::O_TRUNC,
    };

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        FileError::NativeOpen(path.display().to_string(), "embedded NUL".to_string())
    })?;

    let fd = unsafe { libc::open(c_path.as_ptr(), flags, permissions as libc::c_uint) };
    if fd == -1 {
        return Err(FileError::NativeOpen(
            path.display().to_string(),
            std::io::Error::last_os_error().to_string(),
        ));
    }

    trace!("opened {:?} as fd {}", path, fd);
    Ok(fd)
}

#[cfg(windows)]
pub fn native_open_file(
    path: &Path,
    access: FileAccess,
    mode: FileMode,
    permissions: u32,
) -> FileResult<NativeFileHandle> {
    use winapi::um::fileapi::{
        CreateFileW, CREATE_ALWAYS, CREATE_NEW, OPEN_ALWAYS, OPEN_EXISTING, TRUNCATE_EXISTING,
    };
    use winapi::um::handleapi::INVALID_HANDLE_VALUE;
    use winapi::um::winnt::{
        FILE_ATTRIBUTE_NORMAL, FILE_SHARE_READ, GENERIC_READ, GENERIC_WRITE,
    };

    let _ = permissions;

    let desired_access = match access {
        FileAccess::Read => GENERIC_READ,
        FileAccess::Write => GENERIC_WRITE,
        FileAccess::ReadWrite => GENERIC_READ | GENERIC_WRITE,
    };

    let disposition = match mode {
        FileMode::OpenExisting => OPEN_EXISTING,
        FileMode::OpenAlways => OPEN_ALWAYS,
        FileMode::CreateNew => CREATE_NEW,
        FileMode::CreateAlways => CREATE_ALWAYS,
        FileMode::TruncateExisting => TRUNCATE_EXISTING,
    };

    let wide = super::wide_path(path);
    let handle = unsafe {
        CreateFileW(
            wide.as_ptr(),
            desired_access,
            FILE_SHARE_READ,
            std::ptr::null_mut(),
            disposition,
            FILE_ATTRIBUTE_NORMAL,
            std::ptr::null_mut(),
        )
    };

    if handle == INVALID_HANDLE_VALUE {
        return Err(FileError::NativeOpen(
            path.display().to_string(),
            std::io::Error::last_os_error().to_string(),
        ));
    }

    trace!("opened {:?} as handle {:?}", path, handle);
    Ok(handle)
}

/// Close a native handle. Closing the invalid sentinel is a no-op.
pub fn native_close_file(handle: NativeFileHandle) {
    if handle == INVALID_FILE_HANDLE {
        return;
    }

    #[cfg(unix)]
    unsafe {
        libc::close(handle);
    }

    #[cfg(windows)]
    unsafe {
        winapi::um::handleapi::CloseHandle(handle);
    }
}
