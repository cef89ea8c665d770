//! Domain errors raised while acquiring, holding, or releasing a lock.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use nix::errno::Errno;
use thiserror::Error;

use crate::response::Stream;

/// Errors surfaced to callers of [`NsFileLock`](crate::NsFileLock).
#[derive(Debug, Error)]
pub enum LockError {
    /// The namespace handle is missing or cannot be inspected.
    #[error("invalid namespace handle '{handle}': {source}")]
    InvalidNamespace {
        /// Mount namespace handle that failed validation.
        handle: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The holder ran but reported something other than success.
    #[error("failed to lock, response: {reason}")]
    LockFailed {
        /// Text reported by the holder, possibly truncated.
        reason: String,
    },
    /// No answer arrived from the holder before the deadline.
    #[error("timeout waiting for lock on '{path}' after {timeout:?}")]
    LockTimeout {
        /// Target file of the attempt.
        path: PathBuf,
        /// Deadline that elapsed.
        timeout: Duration,
    },
    /// The holder process could not be started.
    #[error("failed to start holder '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: PathBuf,
        /// Underlying OS error, unchanged.
        #[source]
        source: io::Error,
    },
    /// A holder output stream was not captured.
    #[error("failed to capture holder {stream}")]
    MissingPipe {
        /// Stream that was not piped.
        stream: Stream,
    },
    /// A background thread for the lock cycle could not be started.
    #[error("failed to start lock cycle thread: {source}")]
    Thread {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The handle already holds its lock.
    #[error("lock on '{path}' is already held by this handle")]
    AlreadyLocked {
        /// Target file of the held lock.
        path: PathBuf,
    },
    /// The handle does not hold a lock to release.
    #[error("lock on '{path}' is not held by this handle")]
    NotLocked {
        /// Target file of the handle.
        path: PathBuf,
    },
}

impl LockError {
    /// Returns true when the attempt ended because the deadline elapsed.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

/// Errors raised inside the holder process.
///
/// The holder prints these as a single line on stderr; the launching side
/// reports that line as [`LockError::LockFailed`].
#[derive(Debug, Error)]
pub enum HoldError {
    /// The namespace handle could not be opened.
    #[error("failed to open namespace handle '{handle}': {source}")]
    OpenNamespace {
        /// Namespace handle path.
        handle: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Joining the mount namespace failed.
    #[error("failed to enter mount namespace '{handle}': {source}")]
    EnterNamespace {
        /// Namespace handle path.
        handle: PathBuf,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// The lock target could not be opened or created.
    #[error("failed to open lock file '{path}': {source}")]
    OpenTarget {
        /// Lock target path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The advisory lock call failed.
    #[error("failed to flock '{path}': {source}")]
    Acquire {
        /// Lock target path.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// The lock was taken and the request asked not to wait for it.
    ///
    /// Displays as the bare busy token so the launching side can tell it
    /// apart from a real failure.
    #[error("{}", crate::holder::BUSY_RESPONSE)]
    Busy {
        /// Lock target path.
        path: PathBuf,
    },
    /// Writing the success token failed.
    #[error("failed to announce lock: {source}")]
    Announce {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}
