/*!
 * File Subsystem
 * Blocking whole-file I/O and native handle management
 */

pub mod io;
pub mod native;
pub mod types;

pub use io::{
    normalize_executable_path, read_binary_file, read_text_file, write_binary_file,
    write_text_file,
};
pub use native::{native_close_file, native_open_file};
pub use types::{FileAccess, FileMode, NativeFileHandle, INVALID_FILE_HANDLE};

/// UTF-16 conversion for Windows wide-string APIs
#[cfg(windows)]
pub(crate) fn wide_path(path: &std::path::Path) -> Vec<u16> {
    use std::os::windows::ffi::OsStrExt;
    path.as_os_str().encode_wide().chain(std::iter::once(0)).collect()
}

#[cfg(windows)]
pub(crate) fn wide_string(text: &str) -> Vec<u16> {
    text.encode_utf16().chain(std::iter::once(0)).collect()
}
