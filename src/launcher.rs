use crate::argv::Argv;
use crate::command::ExitCode;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{WaitStatus, wait};
use nix::unistd::{ForkResult, fork};
use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Child status when `execv` fails because the file cannot be executed.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;
/// Child status for any other `execv` failure.
pub const EXIT_EXEC_FAILED: i32 = 127;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("cannot create process: {0}")]
    Fork(#[source] Errno),
    #[error("wait failed: {0}")]
    Wait(#[source] Errno),
    #[error("path contains a NUL byte: {0}")]
    InvalidPath(String),
}

/// How a launched program ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited(i32),
    Signaled(Signal),
}

impl ExitOutcome {
    /// Status in shell convention: the exit code, or 128 + signal number.
    pub fn code(self) -> ExitCode {
        match self {
            ExitOutcome::Exited(code) => code,
            ExitOutcome::Signaled(signal) => 128 + signal as i32,
        }
    }
}

/// Runs a resolved program to completion.
pub trait ProcessLauncher {
    fn launch(&mut self, program: &Path, argv: &Argv) -> Result<ExitOutcome, LaunchError>;
}

/// Launches programs with `fork` + `execv` and blocks in `wait`.
///
/// The parent waits for *any* child, not the one it just forked. This is correct
/// only while at most one child is outstanding, which holds because the shell runs
/// commands strictly one after another.
#[derive(Debug, Default)]
pub struct ForkExecLauncher;

impl ProcessLauncher for ForkExecLauncher {
    fn launch(&mut self, program: &Path, argv: &Argv) -> Result<ExitOutcome, LaunchError> {
        let path = CString::new(program.as_os_str().as_bytes())
            .map_err(|_| LaunchError::InvalidPath(program.display().to_string()))?;

        let exec_args = argv.exec_pointers();

        // Callers flush their buffered output first; the child inherits a copy of it.
        // SAFETY: between fork and exec the child only calls execv, reads errno and
        // calls _exit, all async-signal-safe. The path and the pointer array are
        // built before the fork, so the child does not allocate.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                // SAFETY: `path` and every pointer in `exec_args` point into C
                // strings owned by `path` and `argv`, which outlive this call, and
                // the array ends with NULL.
                unsafe { nix::libc::execv(path.as_ptr(), exec_args.as_ptr()) };
                let errno = Errno::last();
                let status = match errno {
                    Errno::EACCES | Errno::ENOEXEC => EXIT_NOT_EXECUTABLE,
                    _ => EXIT_EXEC_FAILED,
                };
                // SAFETY: terminates the forked child without running the parent's
                // atexit handlers or flushing its inherited stdio buffers.
                unsafe { nix::libc::_exit(status) }
            }
            Ok(ForkResult::Parent { child }) => {
                debug!(pid = %child, program = %program.display(), argv = ?argv.to_strings(), "launched");
                wait_any(child)
            }
            Err(errno) => {
                warn!(program = %program.display(), %errno, "fork failed");
                Err(LaunchError::Fork(errno))
            }
        }
    }
}

fn wait_any(expected: nix::unistd::Pid) -> Result<ExitOutcome, LaunchError> {
    loop {
        let (pid, outcome) = match wait() {
            Ok(WaitStatus::Exited(pid, code)) => (pid, ExitOutcome::Exited(code)),
            Ok(WaitStatus::Signaled(pid, signal, _)) => (pid, ExitOutcome::Signaled(signal)),
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(errno) => return Err(LaunchError::Wait(errno)),
        };
        if pid != expected {
            warn!(%expected, reaped = %pid, "reaped a different child than the one launched");
        }
        debug!(%pid, ?outcome, "child finished");
        return Ok(outcome);
    }
}
