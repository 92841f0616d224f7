/*!
 * File Mapping & Shared Memory
 * Read-only file maps and named shared regions over the mapping registry
 */

use super::registry::{MappingEntry, MappingRegistry};
use crate::core::errors::{FileError, FileResult};
use log::{debug, warn};
use std::path::Path;

/// Map a file read-only, returning the base pointer and mapped length.
///
/// The mapping stays registered until [`unmap_file`] is called with the
/// returned pointer. Zero-length files cannot be mapped.
#[cfg(unix)]
pub fn map_file(path: &Path) -> FileResult<(*const u8, usize)> {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| FileError::Open(path.display().to_string()))?;

    let fd = unsafe { libc::open(c_path.as_ptr(), libc::O_RDONLY) };
    if fd == -1 {
        return Err(FileError::Open(path.display().to_string()));
    }

    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    if unsafe { libc::fstat(fd, &mut st) } == -1 {
        unsafe { libc::close(fd) };
        return Err(FileError::Size(
            path.display().to_string(),
            std::io::Error::last_os_error().to_string(),
        ));
    }

    let len = st.st_size as usize;
    if len == 0 {
        unsafe { libc::close(fd) };
        return Err(FileError::EmptyFile(path.display().to_string()));
    }

    let addr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ,
            libc::MAP_PRIVATE,
            fd,
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        unsafe { libc::close(fd) };
        return Err(FileError::MapFailed(format!(
            "{}: {}",
            path.display(),
            std::io::Error::last_os_error()
        )));
    }

    unsafe { libc::madvise(addr, len, libc::MADV_SEQUENTIAL) };

    let base = addr as *const u8;
    MappingRegistry::global().insert(base, MappingEntry { fd, len });
    debug!("mapped {:?} ({} bytes) at {:p}", path, len, base);
    Ok((base, len))
}

#[cfg(windows)]
pub fn map_file(path: &Path) -> FileResult<(*const u8, usize)> {
    use winapi::um::fileapi::{CreateFileW, GetFileSizeEx, OPEN_EXISTING};
    use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
    use winapi::um::memoryapi::{CreateFileMappingW, MapViewOfFile, FILE_MAP_READ};
    use winapi::um::winbase::FILE_FLAG_SEQUENTIAL_SCAN;
    use winapi::um::winnt::{
        FILE_ATTRIBUTE_NORMAL, FILE_SHARE_READ, GENERIC_READ, LARGE_INTEGER, PAGE_READONLY,
    };

    let wide = crate::fs::wide_path(path);
    let handle = unsafe {
        CreateFileW(
            wide.as_ptr(),
            GENERIC_READ,
            FILE_SHARE_READ,
            std::ptr::null_mut(),
            OPEN_EXISTING,
            FILE_ATTRIBUTE_NORMAL | FILE_FLAG_SEQUENTIAL_SCAN,
            std::ptr::null_mut(),
        )
    };
    if handle == INVALID_HANDLE_VALUE {
        return Err(FileError::Open(path.display().to_string()));
    }

    let mut file_size: LARGE_INTEGER = unsafe { std::mem::zeroed() };
    if unsafe { GetFileSizeEx(handle, &mut file_size) } == 0 {
        unsafe { CloseHandle(handle) };
        return Err(FileError::Size(
            path.display().to_string(),
            std::io::Error::last_os_error().to_string(),
        ));
    }

    let len = unsafe { *file_size.QuadPart() } as usize;
    if len == 0 {
        unsafe { CloseHandle(handle) };
        return Err(FileError::EmptyFile(path.display().to_string()));
    }

    let mapping = unsafe {
        CreateFileMappingW(
            handle,
            std::ptr::null_mut(),
            PAGE_READONLY,
            0,
            0,
            std::ptr::null(),
        )
    };
    if mapping.is_null() {
        unsafe { CloseHandle(handle) };
        return Err(FileError::MapFailed(path.display().to_string()));
    }

    let view = unsafe { MapViewOfFile(mapping, FILE_MAP_READ, 0, 0, 0) };
    if view.is_null() {
        unsafe {
            CloseHandle(mapping);
            CloseHandle(handle);
        }
        return Err(FileError::MapFailed(path.display().to_string()));
    }

    let base = view as *const u8;
    MappingRegistry::global().insert(
        base,
        MappingEntry {
            file: handle,
            mapping,
        },
    );
    debug!("mapped {:?} ({} bytes) at {:p}", path, len, base);
    Ok((base, len))
}

/// Release a mapping previously returned by [`map_file`] or
/// [`map_shared_memory`]. Pointers absent from the registry are ignored.
pub fn unmap_file(ptr: *const u8) {
    let entry = match MappingRegistry::global().remove(ptr) {
        Some(entry) => entry,
        None => return,
    };

    #[cfg(unix)]
    unsafe {
        libc::munmap(ptr as *mut libc::c_void, entry.len);
        if entry.fd != -1 {
            libc::close(entry.fd);
        }
    }

    #[cfg(windows)]
    unsafe {
        use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
        use winapi::um::memoryapi::UnmapViewOfFile;

        UnmapViewOfFile(ptr as *const _);
        CloseHandle(entry.mapping);
        if entry.file != INVALID_HANDLE_VALUE {
            CloseHandle(entry.file);
        }
    }

    debug!("unmapped {:p}", ptr);
}

/// Create or open a named shared-memory region mapped read-write.
///
/// The owner allocates and truncates the region; non-owners attach to an
/// existing one. The returned pointer is released through [`unmap_file`].
#[cfg(unix)]
pub fn map_shared_memory(name: &str, size: usize, is_owner: bool) -> FileResult<*mut u8> {
    use std::ffi::CString;

    let c_name =
        CString::new(name).map_err(|_| FileError::ShmFailed(format!("bad name '{}'", name)))?;

    let fd = if is_owner {
        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_RDWR | libc::O_CREAT | libc::O_TRUNC,
                0o666 as libc::mode_t,
            )
        };
        if fd != -1 && unsafe { libc::ftruncate(fd, size as libc::off_t) } == -1 {
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(FileError::ShmFailed(format!(
                "failed to size '{}' to {} bytes",
                name, size
            )));
        }
        fd
    } else {
        unsafe { libc::shm_open(c_name.as_ptr(), libc::O_RDWR, 0o666 as libc::mode_t) }
    };

    if fd == -1 {
        return Err(FileError::ShmFailed(format!(
            "failed to {} '{}'",
            if is_owner { "create" } else { "open" },
            name
        )));
    }

    let addr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            size,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_SHARED,
            fd,
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        unsafe { libc::close(fd) };
        if is_owner {
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
        }
        return Err(FileError::ShmFailed(format!("failed to map '{}'", name)));
    }

    let base = addr as *mut u8;
    MappingRegistry::global().insert(base as *const u8, MappingEntry { fd, len: size });
    debug!(
        "shared memory '{}' ({} bytes) mapped at {:p} as {}",
        name,
        size,
        base,
        if is_owner { "owner" } else { "consumer" }
    );
    Ok(base)
}

#[cfg(windows)]
pub fn map_shared_memory(name: &str, size: usize, is_owner: bool) -> FileResult<*mut u8> {
    use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
    use winapi::um::memoryapi::{
        CreateFileMappingW, MapViewOfFile, OpenFileMappingW, FILE_MAP_ALL_ACCESS,
    };
    use winapi::um::winnt::PAGE_READWRITE;

    let wide = crate::fs::wide_string(name);

    let mapping = if is_owner {
        unsafe {
            CreateFileMappingW(
                INVALID_HANDLE_VALUE,
                std::ptr::null_mut(),
                PAGE_READWRITE,
                ((size as u64) >> 32) as u32,
                (size as u64) as u32,
                wide.as_ptr(),
            )
        }
    } else {
        unsafe { OpenFileMappingW(FILE_MAP_ALL_ACCESS, 0, wide.as_ptr()) }
    };

    if mapping.is_null() {
        return Err(FileError::ShmFailed(format!(
            "failed to {} '{}'",
            if is_owner { "create" } else { "open" },
            name
        )));
    }

    let view = unsafe { MapViewOfFile(mapping, FILE_MAP_ALL_ACCESS, 0, 0, size) };
    if view.is_null() {
        unsafe { CloseHandle(mapping) };
        return Err(FileError::ShmFailed(format!("failed to map '{}'", name)));
    }

    let base = view as *mut u8;
    // Pagefile-backed regions carry no file handle; unmap keys off the
    // sentinel to skip the file close.
    MappingRegistry::global().insert(
        base as *const u8,
        MappingEntry {
            file: INVALID_HANDLE_VALUE,
            mapping,
        },
    );
    debug!("shared memory '{}' ({} bytes) mapped at {:p}", name, size, base);
    Ok(base)
}

/// Remove a named shared-memory object.
///
/// POSIX only; on Windows lifetime is tied to open handles and this is a
/// no-op. Empty names are ignored.
pub fn unlink_shared_memory(name: &str) {
    if name.is_empty() {
        return;
    }

    #[cfg(unix)]
    {
        use std::ffi::CString;

        let c_name = match CString::new(name) {
            Ok(c) => c,
            Err(_) => {
                warn!("cannot unlink shared memory with embedded NUL: '{}'", name);
                return;
            }
        };
        unsafe { libc::shm_unlink(c_name.as_ptr()) };
        debug!("unlinked shared memory '{}'", name);
    }

    #[cfg(windows)]
    {
        let _ = name;
    }
}
