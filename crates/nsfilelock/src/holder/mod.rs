//! Steps performed inside the holder process.
//!
//! The holder joins the target mount namespace, opens the lock target,
//! blocks on an exclusive `flock(2)`, announces [`SUCCESS_RESPONSE`] on its
//! standard output, and then parks until it is signalled. The advisory lock
//! lives exactly as long as the process does.

use std::convert::Infallible;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::thread;

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use nix::sched::{CloneFlags, setns};

use crate::error::HoldError;

/// Token written by the holder once the lock is held.
pub const SUCCESS_RESPONSE: &str = "locked";

/// Token reported by a non-blocking holder when someone else holds the lock.
pub const BUSY_RESPONSE: &str = "busy";

const SELF_MOUNT_HANDLE: &str = "/proc/self/ns/mnt";

/// What a holder process is asked to lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldRequest {
    namespace_handle: PathBuf,
    target: PathBuf,
    nonblocking: bool,
}

impl HoldRequest {
    /// Creates a request for `target` inside the namespace behind
    /// `namespace_handle` (a `.../ns/mnt` path).
    #[must_use]
    pub fn new(namespace_handle: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            namespace_handle: namespace_handle.into(),
            target: target.into(),
            nonblocking: false,
        }
    }

    /// Asks the holder to give up with [`BUSY_RESPONSE`] instead of waiting
    /// when the lock is taken.
    #[must_use]
    pub const fn nonblocking(mut self, nonblocking: bool) -> Self {
        self.nonblocking = nonblocking;
        self
    }

    /// Mount namespace handle to enter.
    #[must_use]
    pub fn namespace_handle(&self) -> &Path {
        &self.namespace_handle
    }

    /// File to lock, as seen from inside the namespace.
    #[must_use]
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Whether the holder should try the lock once rather than wait for it.
    #[must_use]
    pub const fn is_nonblocking(&self) -> bool {
        self.nonblocking
    }
}

/// Runs the whole holder sequence and never returns on success.
///
/// # Errors
///
/// Returns the first [`HoldError`] raised while entering the namespace,
/// acquiring the lock, or announcing it.
pub fn hold<W: Write>(request: &HoldRequest, announce_to: &mut W) -> Result<Infallible, HoldError> {
    enter_namespace(request.namespace_handle())?;
    let lock = if request.is_nonblocking() {
        try_acquire(request.target())?
    } else {
        acquire(request.target())?
    };
    announce(announce_to)?;
    let _held = lock;
    loop {
        thread::park();
    }
}

/// Joins the mount namespace behind `handle`.
///
/// Entering the namespace the process already lives in is skipped, so
/// locking within one's own namespace needs no `CAP_SYS_ADMIN`.
///
/// # Errors
///
/// Returns [`HoldError::OpenNamespace`] when the handle cannot be opened or
/// inspected and [`HoldError::EnterNamespace`] when `setns(2)` fails.
pub fn enter_namespace(handle: &Path) -> Result<(), HoldError> {
    let namespace = File::open(handle).map_err(|source| HoldError::OpenNamespace {
        handle: handle.to_path_buf(),
        source,
    })?;
    if is_current_namespace(&namespace, handle)? {
        return Ok(());
    }
    setns(&namespace, CloneFlags::CLONE_NEWNS).map_err(|source| HoldError::EnterNamespace {
        handle: handle.to_path_buf(),
        source,
    })
}

fn is_current_namespace(namespace: &File, handle: &Path) -> Result<bool, HoldError> {
    let target = namespace
        .metadata()
        .map_err(|source| HoldError::OpenNamespace {
            handle: handle.to_path_buf(),
            source,
        })?;
    let current = fs::metadata(SELF_MOUNT_HANDLE).map_err(|source| HoldError::OpenNamespace {
        handle: PathBuf::from(SELF_MOUNT_HANDLE),
        source,
    })?;
    Ok(target.dev() == current.dev() && target.ino() == current.ino())
}

/// Opens (creating if needed) and exclusively locks `target`, blocking until
/// the lock is granted. Existing contents are left untouched.
///
/// # Errors
///
/// Returns [`HoldError::OpenTarget`] or [`HoldError::Acquire`].
pub fn acquire(target: &Path) -> Result<Flock<File>, HoldError> {
    lock_target(target, FlockArg::LockExclusive)
}

/// Like [`acquire`], but fails with [`HoldError::Busy`] instead of waiting
/// when another open file description holds the lock.
///
/// # Errors
///
/// Returns [`HoldError::OpenTarget`], [`HoldError::Busy`], or
/// [`HoldError::Acquire`].
pub fn try_acquire(target: &Path) -> Result<Flock<File>, HoldError> {
    lock_target(target, FlockArg::LockExclusiveNonblock).map_err(|error| match error {
        HoldError::Acquire {
            path,
            source: Errno::EWOULDBLOCK,
        } => HoldError::Busy { path },
        other => other,
    })
}

fn lock_target(target: &Path, mode: FlockArg) -> Result<Flock<File>, HoldError> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(target)
        .map_err(|source| HoldError::OpenTarget {
            path: target.to_path_buf(),
            source,
        })?;
    loop {
        match Flock::lock(file, mode) {
            Ok(lock) => return Ok(lock),
            Err((returned, Errno::EINTR)) => file = returned,
            Err((_, source)) => {
                return Err(HoldError::Acquire {
                    path: target.to_path_buf(),
                    source,
                });
            }
        }
    }
}

/// Writes the success token as a single line and flushes it.
///
/// # Errors
///
/// Returns [`HoldError::Announce`] when the write or flush fails.
pub fn announce<W: Write>(out: &mut W) -> Result<(), HoldError> {
    writeln!(out, "{SUCCESS_RESPONSE}").map_err(|source| HoldError::Announce { source })?;
    out.flush().map_err(|source| HoldError::Announce { source })
}
