/*!
 * Blocking File I/O
 * Whole-file text/binary reads and writes with exclusive-create semantics
 */

use crate::core::errors::{FileError, FileResult};
use log::{debug, trace};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// Read an entire file as text.
///
/// Zero-length files return an empty string. Non-UTF-8 bytes are replaced.
pub fn read_text_file(path: &Path) -> FileResult<String> {
    let bytes = read_binary_file(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Read an entire file as bytes. Zero-length files return an empty buffer.
pub fn read_binary_file(path: &Path) -> FileResult<Vec<u8>> {
    let mut file = File::open(path).map_err(|e| {
        debug!("open failed for {:?}: {}", path, e);
        FileError::Open(path.display().to_string())
    })?;

    let len = file.metadata().map(|m| m.len() as usize).unwrap_or(0);
    let mut buffer = Vec::with_capacity(len);
    file.read_to_end(&mut buffer)
        .map_err(|_| FileError::Open(path.display().to_string()))?;

    trace!("read {} bytes from {:?}", buffer.len(), path);
    Ok(buffer)
}

/// Write text to a file, returning the number of bytes written.
///
/// With `overwrite == false` the write fails if the file already exists and
/// the existing file is left untouched.
pub fn write_text_file(path: &Path, contents: &str, overwrite: bool) -> FileResult<usize> {
    write_bytes(path, contents.as_bytes(), overwrite)
}

/// Write bytes to a file, returning the number of bytes written.
pub fn write_binary_file(path: &Path, contents: &[u8], overwrite: bool) -> FileResult<usize> {
    write_bytes(path, contents, overwrite)
}

fn write_bytes(path: &Path, data: &[u8], overwrite: bool) -> FileResult<usize> {
    let mut options = OpenOptions::new();
    options.write(true);
    if overwrite {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = options.open(path).map_err(|e| {
        if !overwrite && e.kind() == ErrorKind::AlreadyExists {
            FileError::AlreadyExists(path.display().to_string())
        } else {
            debug!("write open failed for {:?}: {}", path, e);
            FileError::Write(path.display().to_string())
        }
    })?;

    file.write_all(data)
        .map_err(|_| FileError::Write(path.display().to_string()))?;

    trace!("wrote {} bytes to {:?}", data.len(), path);
    Ok(data.len())
}

/// Normalize a path so it can be handed to the process spawner.
///
/// Windows appends `.exe` when no extension is present. POSIX strips a
/// `.exe` extension and prefixes `./` to bare relative paths so `execvp`
/// does not consult `PATH` for them.
pub fn normalize_executable_path(path: &Path) -> PathBuf {
    #[cfg(windows)]
    {
        let mut result = path.to_path_buf();
        if result.extension().is_none() {
            result.set_extension("exe");
        }
        result
    }

    #[cfg(not(windows))]
    {
        let mut result = path.to_path_buf();
        if result.extension().map(|e| e == "exe").unwrap_or(false) {
            result.set_extension("");
        }

        if result.is_relative() {
            let text = result.to_string_lossy();
            if !text.starts_with("./") && !text.starts_with("../") {
                return PathBuf::from(format!("./{}", text));
            }
        }
        result
    }
}
