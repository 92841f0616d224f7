/*!
 * Process Supervisor
 * Sync and async child spawn with joined stdout/stderr line capture
 */

use super::line_buffer::LineBuffer;
use super::types::{ProcessHandle, SharedProcessState};
use crate::core::errors::{ProcessError, ProcessResult};
use crate::core::types::Pid;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

#[cfg(unix)]
use nix::sys::signal::{kill, Signal as UnixSignal};
#[cfg(unix)]
use nix::unistd::Pid as NixPid;

/// Pipe read chunk size
const READ_CHUNK: usize = 4096;

/// The calling process's own PID
pub fn current_pid() -> Pid {
    std::process::id()
}

/// Spawn a child and block until it exits.
///
/// stdout and stderr are joined into a single pipe; `on_line` fires on the
/// calling thread once per complete output line. Returns the child's exit
/// code (`-1` for abnormal termination on POSIX).
pub fn spawn_process_sync<F>(command: &str, args: &str, mut on_line: F) -> ProcessResult<i32>
where
    F: FnMut(&str),
{
    let id = AtomicU32::new(0);
    spawn_impl(command, args, &mut on_line, &id)
}

/// Spawn a child supervised by a dedicated thread.
///
/// The returned handle exposes the PID and running flag; `on_line` fires on
/// the supervising thread, and `on_finish` receives the final result after
/// `is_running` has been cleared.
pub fn spawn_process_async<F, G>(
    command: &str,
    args: &str,
    on_line: F,
    on_finish: G,
) -> ProcessResult<ProcessHandle>
where
    F: FnMut(&str) + Send + 'static,
    G: FnOnce(&ProcessResult<i32>) + Send + 'static,
{
    let state = Arc::new(SharedProcessState::new());
    state.running.store(true, Ordering::SeqCst);

    let thread_state = Arc::clone(&state);
    let command_owned = command.to_string();
    let args_owned = args.to_string();

    let supervisor = thread::Builder::new()
        .name("process-supervisor".to_string())
        .spawn(move || {
            let mut on_line = on_line;
            let result = spawn_impl(&command_owned, &args_owned, &mut on_line, &thread_state.id);
            thread_state.running.store(false, Ordering::SeqCst);
            on_finish(&result);
        })
        .map_err(|e| {
            ProcessError::SpawnFailed(format!("supervisor thread: {}", e))
        })?;

    info!("supervising '{}' asynchronously", command);
    Ok(ProcessHandle::new(state, supervisor))
}

/// Kill the child behind an active handle.
///
/// Inactive handles and PID 0 are ignored. The supervising thread is not
/// joined here; it observes EOF and the exit status on its own.
pub fn terminate_process(handle: &ProcessHandle) {
    if !handle.is_active() {
        return;
    }

    let pid = handle.pid();
    if pid == 0 {
        return;
    }

    #[cfg(unix)]
    {
        if let Err(e) = kill(NixPid::from_raw(pid as i32), UnixSignal::SIGKILL) {
            warn!("failed to kill PID {}: {}", pid, e);
        } else {
            info!("killed PID {}", pid);
        }
    }

    #[cfg(windows)]
    unsafe {
        use winapi::um::handleapi::CloseHandle;
        use winapi::um::processthreadsapi::{OpenProcess, TerminateProcess};
        use winapi::um::winnt::PROCESS_TERMINATE;

        let process = OpenProcess(PROCESS_TERMINATE, 0, pid);
        if !process.is_null() {
            TerminateProcess(process, 9);
            CloseHandle(process);
            info!("terminated PID {}", pid);
        }
    }
}

fn spawn_impl<F>(command: &str, args: &str, on_line: &mut F, id: &AtomicU32) -> ProcessResult<i32>
where
    F: FnMut(&str),
{
    #[cfg(unix)]
    {
        spawn_posix(command, args, on_line, id)
    }

    #[cfg(windows)]
    {
        spawn_windows(command, args, on_line, id)
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (command, args, on_line, id);
        Err(ProcessError::NotSupported(
            "no native process backend".to_string(),
        ))
    }
}

/// Split an argument string into tokens.
///
/// Whitespace separates tokens outside double quotes; quotes toggle and are
/// consumed; a backslash escapes the next character verbatim.
#[cfg_attr(windows, allow(dead_code))]
fn tokenize_args(args: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in args.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }

        match c {
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            ' ' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

#[cfg(unix)]
fn spawn_posix<F>(command: &str, args: &str, on_line: &mut F, id: &AtomicU32) -> ProcessResult<i32>
where
    F: FnMut(&str),
{
    use std::ffi::CString;

    let mut pipefd = [0i32; 2];
    if unsafe { libc::pipe(pipefd.as_mut_ptr()) } == -1 {
        return Err(ProcessError::PipeFailed(
            std::io::Error::last_os_error().to_string(),
        ));
    }

    // argv is built before the fork so the child only touches
    // async-signal-safe calls.
    let c_command = CString::new(command)
        .map_err(|_| ProcessError::InvalidCommand(command.to_string()))?;
    let mut c_args = vec![c_command.clone()];
    for token in tokenize_args(args) {
        c_args.push(
            CString::new(token).map_err(|_| ProcessError::InvalidCommand(command.to_string()))?,
        );
    }
    let mut argv: Vec<*const libc::c_char> = c_args.iter().map(|a| a.as_ptr()).collect();
    argv.push(std::ptr::null());

    let pid = unsafe { libc::fork() };
    match pid {
        -1 => {
            unsafe {
                libc::close(pipefd[0]);
                libc::close(pipefd[1]);
            }
            Err(ProcessError::SpawnFailed(format!(
                "fork failed: {}",
                std::io::Error::last_os_error()
            )))
        }
        0 => unsafe {
            libc::close(pipefd[0]);
            libc::dup2(pipefd[1], libc::STDOUT_FILENO);
            libc::dup2(pipefd[1], libc::STDERR_FILENO);
            libc::close(pipefd[1]);

            libc::execvp(c_command.as_ptr(), argv.as_ptr());
            libc::_exit(127)
        },
        child => {
            id.store(child as u32, Ordering::SeqCst);
            debug!("forked '{}' as PID {}", command, child);

            // Close our copy of the write end so the read loop sees EOF.
            unsafe { libc::close(pipefd[1]) };

            let mut line_buf = LineBuffer::new(|line: &str| on_line(line));
            let mut buffer = [0u8; READ_CHUNK];
            loop {
                let count = unsafe {
                    libc::read(
                        pipefd[0],
                        buffer.as_mut_ptr() as *mut libc::c_void,
                        buffer.len(),
                    )
                };
                if count <= 0 {
                    break;
                }
                line_buf.append(&buffer[..count as usize]);
            }
            line_buf.flush();
            unsafe { libc::close(pipefd[0]) };

            let mut status: libc::c_int = 0;
            unsafe { libc::waitpid(child, &mut status, 0) };
            id.store(0, Ordering::SeqCst);

            if libc::WIFEXITED(status) {
                let code = libc::WEXITSTATUS(status);
                debug!("PID {} exited with code {}", child, code);
                Ok(code)
            } else {
                debug!("PID {} terminated abnormally", child);
                Ok(-1)
            }
        }
    }
}

#[cfg(windows)]
fn spawn_windows<F>(
    command: &str,
    args: &str,
    on_line: &mut F,
    id: &AtomicU32,
) -> ProcessResult<i32>
where
    F: FnMut(&str),
{
    use winapi::shared::minwindef::{DWORD, TRUE};
    use winapi::um::fileapi::ReadFile;
    use winapi::um::handleapi::{CloseHandle, SetHandleInformation};
    use winapi::um::minwinbase::SECURITY_ATTRIBUTES;
    use winapi::um::namedpipeapi::CreatePipe;
    use winapi::um::processthreadsapi::{
        CreateProcessW, GetExitCodeProcess, PROCESS_INFORMATION, STARTUPINFOW,
    };
    use winapi::um::synchapi::WaitForSingleObject;
    use winapi::um::winbase::{HANDLE_FLAG_INHERIT, INFINITE, STARTF_USESTDHANDLES};

    let mut sa: SECURITY_ATTRIBUTES = unsafe { std::mem::zeroed() };
    sa.nLength = std::mem::size_of::<SECURITY_ATTRIBUTES>() as DWORD;
    sa.bInheritHandle = TRUE;

    let mut h_read = std::ptr::null_mut();
    let mut h_write = std::ptr::null_mut();
    if unsafe { CreatePipe(&mut h_read, &mut h_write, &mut sa, 0) } == 0 {
        return Err(ProcessError::PipeFailed(
            std::io::Error::last_os_error().to_string(),
        ));
    }

    if unsafe { SetHandleInformation(h_read, HANDLE_FLAG_INHERIT, 0) } == 0 {
        unsafe {
            CloseHandle(h_read);
            CloseHandle(h_write);
        }
        return Err(ProcessError::PipeFailed(
            "failed to secure pipe handles".to_string(),
        ));
    }

    let mut si: STARTUPINFOW = unsafe { std::mem::zeroed() };
    si.cb = std::mem::size_of::<STARTUPINFOW>() as DWORD;
    si.dwFlags |= STARTF_USESTDHANDLES;
    si.hStdOutput = h_write;
    si.hStdError = h_write;
    si.hStdInput = std::ptr::null_mut();

    let mut pi: PROCESS_INFORMATION = unsafe { std::mem::zeroed() };

    let mut command_line = crate::fs::wide_string(&format!("\"{}\" {}", command, args));

    let success = unsafe {
        CreateProcessW(
            std::ptr::null(),
            command_line.as_mut_ptr(),
            std::ptr::null_mut(),
            std::ptr::null_mut(),
            TRUE,
            0,
            std::ptr::null_mut(),
            std::ptr::null(),
            &mut si,
            &mut pi,
        )
    };

    unsafe { CloseHandle(h_write) };

    if success == 0 {
        unsafe { CloseHandle(h_read) };
        return Err(ProcessError::SpawnFailed(format!(
            "CreateProcess failed: {}",
            std::io::Error::last_os_error()
        )));
    }

    id.store(pi.dwProcessId, Ordering::SeqCst);
    debug!("created '{}' as PID {}", command, pi.dwProcessId);

    let mut line_buf = LineBuffer::new(|line: &str| on_line(line));
    let mut buffer = [0u8; READ_CHUNK];
    let mut bytes_read: DWORD = 0;
    loop {
        let ok = unsafe {
            ReadFile(
                h_read,
                buffer.as_mut_ptr() as *mut _,
                buffer.len() as DWORD,
                &mut bytes_read,
                std::ptr::null_mut(),
            )
        };
        if ok == 0 || bytes_read == 0 {
            break;
        }
        line_buf.append(&buffer[..bytes_read as usize]);
    }
    line_buf.flush();

    let mut exit_code: DWORD = 0;
    unsafe {
        WaitForSingleObject(pi.hProcess, INFINITE);
        GetExitCodeProcess(pi.hProcess, &mut exit_code);

        CloseHandle(pi.hProcess);
        CloseHandle(pi.hThread);
        CloseHandle(h_read);
    }
    id.store(0, Ordering::SeqCst);

    debug!("PID {} exited with code {}", pi.dwProcessId, exit_code);
    Ok(exit_code as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_simple() {
        assert_eq!(tokenize_args("one two three"), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_tokenize_collapses_spaces() {
        assert_eq!(tokenize_args("one   two"), vec!["one", "two"]);
        assert!(tokenize_args("   ").is_empty());
    }

    #[test]
    fn test_tokenize_quotes() {
        assert_eq!(
            tokenize_args("-c \"exit 42\""),
            vec!["-c".to_string(), "exit 42".to_string()]
        );
    }

    #[test]
    fn test_tokenize_escapes() {
        assert_eq!(
            tokenize_args("-DMSG=\\\"Hello World\\\" -v"),
            vec!["-DMSG=\"Hello".to_string(), "World\"".to_string(), "-v".to_string()]
        );
        assert_eq!(tokenize_args("a\\ b"), vec!["a b".to_string()]);
    }

    #[test]
    fn test_tokenize_trailing_token() {
        assert_eq!(tokenize_args("alpha beta"), vec!["alpha", "beta"]);
        assert_eq!(tokenize_args("solo"), vec!["solo"]);
    }

    #[test]
    fn test_current_pid_nonzero() {
        assert!(current_pid() > 0);
    }
}
