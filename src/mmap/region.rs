/*!
 * Mapped Region
 * Move-only owner of a writable shared file mapping
 */

use crate::core::errors::{FileError, FileResult};
use crate::fs::types::{NativeFileHandle, INVALID_FILE_HANDLE};
use log::trace;

/// Exclusive owner of a writable file mapping.
///
/// The region is move-only; dropping it releases the view. The underlying
/// file handle is caller-owned and is never closed here. `ptr()` is null
/// exactly when `len()` is zero.
#[derive(Debug)]
pub struct MappedRegion {
    ptr: *mut u8,
    size: usize,

    #[cfg(windows)]
    map_handle: winapi::um::winnt::HANDLE,
}

// SAFETY: the region exclusively owns its view; the pointer is not shared.
unsafe impl Send for MappedRegion {}

impl MappedRegion {
    /// An unmapped region
    pub const fn new() -> Self {
        Self {
            ptr: std::ptr::null_mut(),
            size: 0,

            #[cfg(windows)]
            map_handle: std::ptr::null_mut(),
        }
    }

    /// Map `size` bytes of `handle` starting at `offset`, read-write shared.
    ///
    /// The file is extended to `offset + size` when shorter. Any previously
    /// held view is released first. Zero-size requests and the invalid
    /// handle sentinel are rejected.
    #[cfg(unix)]
    pub fn map(&mut self, handle: NativeFileHandle, offset: u64, size: usize) -> FileResult<()> {
        self.unmap();

        if handle == INVALID_FILE_HANDLE {
            return Err(FileError::MapFailed("invalid file handle".to_string()));
        }
        if size == 0 {
            return Err(FileError::MapFailed(
                "cannot map a zero-sized region".to_string(),
            ));
        }

        let mut st: libc::stat = unsafe { std::mem::zeroed() };
        if unsafe { libc::fstat(handle, &mut st) } == -1 {
            return Err(FileError::Size(
                format!("fd {}", handle),
                std::io::Error::last_os_error().to_string(),
            ));
        }

        let end_offset = offset + size as u64;
        if (st.st_size as u64) < end_offset {
            if unsafe { libc::ftruncate(handle, end_offset as libc::off_t) } == -1 {
                return Err(FileError::MapFailed(format!(
                    "failed to extend file to {} bytes: {}",
                    end_offset,
                    std::io::Error::last_os_error()
                )));
            }
        }

        let addr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                handle,
                offset as libc::off_t,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(FileError::MapFailed(format!(
                "mmap failed (offset: {}, size: {}): {}",
                offset,
                size,
                std::io::Error::last_os_error()
            )));
        }

        self.ptr = addr as *mut u8;
        self.size = size;
        unsafe { libc::madvise(addr, size, libc::MADV_SEQUENTIAL) };

        trace!("mapped {} bytes at {:p} (offset {})", size, self.ptr, offset);
        Ok(())
    }

    #[cfg(windows)]
    pub fn map(&mut self, handle: NativeFileHandle, offset: u64, size: usize) -> FileResult<()> {
        use winapi::um::fileapi::{GetFileSizeEx, SetEndOfFile, SetFilePointerEx};
        use winapi::um::handleapi::CloseHandle;
        use winapi::um::memoryapi::{CreateFileMappingW, MapViewOfFile, FILE_MAP_WRITE};
        use winapi::um::winbase::FILE_BEGIN;
        use winapi::um::winnt::{LARGE_INTEGER, PAGE_READWRITE};

        self.unmap();

        if handle == INVALID_FILE_HANDLE {
            return Err(FileError::MapFailed("invalid file handle".to_string()));
        }
        if size == 0 {
            return Err(FileError::MapFailed(
                "cannot map a zero-sized region".to_string(),
            ));
        }

        let mut file_size: LARGE_INTEGER = unsafe { std::mem::zeroed() };
        if unsafe { GetFileSizeEx(handle, &mut file_size) } == 0 {
            return Err(FileError::Size(
                "file handle".to_string(),
                std::io::Error::last_os_error().to_string(),
            ));
        }

        let end_offset = offset + size as u64;
        if (unsafe { *file_size.QuadPart() } as u64) < end_offset {
            let mut new_size: LARGE_INTEGER = unsafe { std::mem::zeroed() };
            unsafe { *new_size.QuadPart_mut() = end_offset as i64 };
            if unsafe { SetFilePointerEx(handle, new_size, std::ptr::null_mut(), FILE_BEGIN) } == 0
                || unsafe { SetEndOfFile(handle) } == 0
            {
                return Err(FileError::MapFailed(format!(
                    "failed to extend file to {} bytes",
                    end_offset
                )));
            }
        }

        let mapping = unsafe {
            CreateFileMappingW(
                handle,
                std::ptr::null_mut(),
                PAGE_READWRITE,
                0,
                0,
                std::ptr::null(),
            )
        };
        if mapping.is_null() {
            return Err(FileError::MapFailed(
                std::io::Error::last_os_error().to_string(),
            ));
        }

        let view = unsafe {
            MapViewOfFile(
                mapping,
                FILE_MAP_WRITE,
                (offset >> 32) as u32,
                offset as u32,
                size,
            )
        };
        if view.is_null() {
            unsafe { CloseHandle(mapping) };
            return Err(FileError::MapFailed(format!(
                "failed to map view (offset: {}, size: {}): {}",
                offset,
                size,
                std::io::Error::last_os_error()
            )));
        }

        self.map_handle = mapping;
        self.ptr = view as *mut u8;
        self.size = size;

        trace!("mapped {} bytes at {:p} (offset {})", size, self.ptr, offset);
        Ok(())
    }

    /// Release the view. The caller's file handle stays open.
    pub fn unmap(&mut self) {
        if self.ptr.is_null() {
            return;
        }

        #[cfg(unix)]
        unsafe {
            libc::munmap(self.ptr as *mut libc::c_void, self.size);
        }

        #[cfg(windows)]
        unsafe {
            winapi::um::memoryapi::UnmapViewOfFile(self.ptr as *const _);
            if !self.map_handle.is_null() {
                winapi::um::handleapi::CloseHandle(self.map_handle);
                self.map_handle = std::ptr::null_mut();
            }
        }

        trace!("unmapped {} bytes at {:p}", self.size, self.ptr);
        self.ptr = std::ptr::null_mut();
        self.size = 0;
    }

    /// Synchronize dirty pages back to the file. No-op when unmapped.
    pub fn flush(&self) {
        if self.ptr.is_null() {
            return;
        }

        #[cfg(unix)]
        unsafe {
            libc::msync(self.ptr as *mut libc::c_void, self.size, libc::MS_SYNC);
        }

        #[cfg(windows)]
        unsafe {
            winapi::um::memoryapi::FlushViewOfFile(self.ptr as *const _, self.size);
        }
    }

    pub fn ptr(&self) -> *mut u8 {
        self.ptr
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn is_valid(&self) -> bool {
        !self.ptr.is_null()
    }
}

impl Drop for MappedRegion {
    fn drop(&mut self) {
        self.unmap();
    }
}

impl Default for MappedRegion {
    fn default() -> Self {
        Self::new()
    }
}
