//! Holder process construction, spawning, and termination.

use std::io;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use nix::errno::Errno;
use nix::sys::prctl::set_pdeathsig;
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::{debug, warn};

use crate::PROCESS_TARGET;
use crate::error::LockError;
use crate::holder::HoldRequest;

/// Starts the process that will hold a lock on the caller's behalf.
///
/// The returned child must have piped stdout and stderr; the lock cycle reads
/// its answer from them and terminates the child on release or failure.
pub trait HolderLauncher {
    /// Spawns a holder for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::Spawn`] when the process cannot be started.
    fn launch(&self, request: &HoldRequest) -> Result<Child, LockError>;
}

/// Launches the `nsfilelock-holder` binary.
///
/// The holder receives its request as an argument vector
/// (`--namespace <handle> [--nonblocking] <target>`); no shell is involved.
/// The child is armed with `PR_SET_PDEATHSIG = SIGTERM` so it dies with
/// the spawning thread if the caller goes away without unlocking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemLauncher {
    program: PathBuf,
}

impl SystemLauncher {
    /// Creates a launcher for the given holder program.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Holder program path.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Builds the holder command line without configuring stdio.
    #[must_use]
    pub fn command(&self, request: &HoldRequest) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("--namespace").arg(request.namespace_handle());
        if request.is_nonblocking() {
            command.arg("--nonblocking");
        }
        command.arg(request.target());
        command
    }
}

impl HolderLauncher for SystemLauncher {
    fn launch(&self, request: &HoldRequest) -> Result<Child, LockError> {
        let mut command = self.command(request);
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // SAFETY: the hook runs between fork and exec and only issues
        // prctl(2), which is async-signal-safe and does not allocate.
        unsafe {
            command.pre_exec(|| set_pdeathsig(Signal::SIGTERM).map_err(io::Error::from));
        }

        debug!(
            target: PROCESS_TARGET,
            program = %self.program.display(),
            namespace = %request.namespace_handle().display(),
            path = %request.target().display(),
            nonblocking = request.is_nonblocking(),
            "spawning holder process"
        );
        let child = command.spawn().map_err(|source| LockError::Spawn {
            program: self.program.clone(),
            source,
        })?;
        debug!(target: PROCESS_TARGET, pid = child.id(), "holder process started");
        Ok(child)
    }
}

/// Sends `SIGTERM` to the holder and reaps it.
///
/// A holder that already exited is not an error. Failures are logged rather
/// than returned because termination always runs on a cleanup path.
pub(crate) fn terminate(child: &mut Child) {
    let pid = child.id();
    match i32::try_from(pid) {
        Ok(raw) => match kill(Pid::from_raw(raw), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(error) => {
                warn!(
                    target: PROCESS_TARGET,
                    pid,
                    error = %error,
                    "failed to signal holder process"
                );
            }
        },
        Err(_) => {
            if let Err(error) = child.kill() {
                warn!(
                    target: PROCESS_TARGET,
                    pid,
                    error = %error,
                    "failed to kill holder process"
                );
            }
        }
    }
    match child.wait() {
        Ok(status) => debug!(target: PROCESS_TARGET, pid, ?status, "holder process reaped"),
        Err(error) => warn!(
            target: PROCESS_TARGET,
            pid,
            error = %error,
            "failed to reap holder process"
        ),
    }
}
