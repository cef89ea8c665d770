//! The user-facing lock handle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::LOCK_TARGET;
use crate::arbiter::{Verdict, arbitrate};
use crate::error::LockError;
use crate::holder::HoldRequest;
use crate::launch::{HolderLauncher, SystemLauncher, terminate};
use crate::namespace::Namespace;
use crate::options::{DEFAULT_TIMEOUT, LockOptions};
use crate::response;
use crate::watcher::ReleaseWatcher;

/// An advisory lock on a file inside another mount namespace.
///
/// Each [`lock`](Self::lock) call spawns a holder process that enters the
/// target namespace, takes an exclusive `flock(2)` on the file, and keeps it
/// until [`unlock`](Self::unlock) terminates the holder. A handle can be
/// reused for any number of lock/unlock cycles; each cycle gets a fresh
/// holder. Dropping a handle that holds its lock releases it.
///
/// ```rust,no_run
/// use nsfilelock::NsFileLock;
///
/// # fn main() -> Result<(), nsfilelock::LockError> {
/// let mut lock = NsFileLock::new("/host/proc/1/ns", "/var/lib/app/lock");
/// lock.lock()?;
/// // critical section
/// lock.unlock()?;
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct NsFileLock<L = SystemLauncher> {
    namespace: Namespace,
    path: PathBuf,
    options: LockOptions,
    launcher: L,
    held: Option<ReleaseWatcher>,
}

impl NsFileLock {
    /// Creates a handle with default options. An empty `namespace` selects
    /// the init process's namespaces.
    #[must_use]
    pub fn new(namespace: impl AsRef<Path>, path: impl Into<PathBuf>) -> Self {
        Self::with_options(namespace, path, LockOptions::new())
    }

    /// Creates a handle with a custom acquisition timeout.
    #[must_use]
    pub fn with_timeout(
        namespace: impl AsRef<Path>,
        path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self::with_options(namespace, path, LockOptions::new().timeout(timeout))
    }

    /// Creates a handle from explicit options, launching the holder program
    /// they resolve to.
    #[must_use]
    pub fn with_options(
        namespace: impl AsRef<Path>,
        path: impl Into<PathBuf>,
        options: LockOptions,
    ) -> Self {
        let launcher = SystemLauncher::new(options.holder_program());
        Self::with_launcher(namespace, path, options, launcher)
    }
}

impl<L: HolderLauncher> NsFileLock<L> {
    /// Creates a handle that starts holders through `launcher`.
    #[must_use]
    pub fn with_launcher(
        namespace: impl AsRef<Path>,
        path: impl Into<PathBuf>,
        options: LockOptions,
        launcher: L,
    ) -> Self {
        Self {
            namespace: Namespace::new(namespace),
            path: path.into(),
            options,
            launcher,
            held: None,
        }
    }

    /// Target namespace.
    #[must_use]
    pub const fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// File locked inside the target namespace.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquisition timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.options.timeout_duration()
    }

    /// Whether this handle currently holds its lock.
    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.held.is_some()
    }

    /// Pid of the holder process while the lock is held.
    #[must_use]
    pub fn holder_pid(&self) -> Option<u32> {
        self.held.as_ref().map(ReleaseWatcher::pid)
    }

    /// Acquires the lock, waiting at most the configured timeout.
    ///
    /// Makes exactly one attempt. A zero timeout makes it a try-lock: the
    /// holder takes a free lock and reports a held one as busy without
    /// waiting, and only its start-up is bounded by [`DEFAULT_TIMEOUT`].
    /// On any failure the holder is terminated
    /// before the error is returned, so a failed call never leaves a process
    /// holding the lock.
    ///
    /// The holder is armed with a parent-death signal, which Linux delivers
    /// when the *thread* that spawned it exits. Keep the calling thread alive
    /// for as long as the lock must be held.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if this handle already holds the lock;
    ///   nothing is spawned.
    /// - [`LockError::InvalidNamespace`] if the namespace handle is missing;
    ///   nothing is spawned.
    /// - [`LockError::Spawn`] if the holder cannot be started.
    /// - [`LockError::LockFailed`] if the holder reported an error.
    /// - [`LockError::LockTimeout`] if no answer arrived in time, or the lock
    ///   was busy under a zero timeout. This is the expected outcome while
    ///   another party holds the lock.
    pub fn lock(&mut self) -> Result<(), LockError> {
        if self.held.is_some() {
            return Err(LockError::AlreadyLocked {
                path: self.path.clone(),
            });
        }
        let handle = self.namespace.validate()?;
        let timeout = self.options.timeout_duration();
        let try_once = timeout.is_zero();
        let request = HoldRequest::new(handle, &self.path).nonblocking(try_once);
        let answer_window = if try_once { DEFAULT_TIMEOUT } else { timeout };
        debug!(
            target: LOCK_TARGET,
            namespace = %self.namespace.dir().display(),
            path = %self.path.display(),
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "attempting lock"
        );

        let mut child = self.launcher.launch(&request)?;
        let responses = match response::collect(&mut child, self.options.message_limit()) {
            Ok(responses) => responses,
            Err(error) => {
                terminate(&mut child);
                return Err(error);
            }
        };

        match arbitrate(&responses, answer_window) {
            Verdict::Acquired => {
                let watcher = ReleaseWatcher::start(child)?;
                info!(
                    target: LOCK_TARGET,
                    path = %self.path.display(),
                    pid = watcher.pid(),
                    "lock acquired"
                );
                self.held = Some(watcher);
                Ok(())
            }
            Verdict::Failed(reason) => {
                warn!(
                    target: LOCK_TARGET,
                    path = %self.path.display(),
                    reason = %reason,
                    "holder reported failure"
                );
                terminate(&mut child);
                Err(LockError::LockFailed { reason })
            }
            Verdict::Busy => {
                info!(
                    target: LOCK_TARGET,
                    path = %self.path.display(),
                    "lock is held elsewhere"
                );
                terminate(&mut child);
                Err(LockError::LockTimeout {
                    path: self.path.clone(),
                    timeout,
                })
            }
            Verdict::TimedOut => {
                info!(
                    target: LOCK_TARGET,
                    path = %self.path.display(),
                    timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                    "timed out waiting for lock"
                );
                terminate(&mut child);
                Err(LockError::LockTimeout {
                    path: self.path.clone(),
                    timeout,
                })
            }
        }
    }

    /// Releases the lock and waits until the holder has been reaped.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::NotLocked`] immediately when the handle does not
    /// hold its lock, including a second unlock of the same cycle.
    pub fn unlock(&mut self) -> Result<(), LockError> {
        let watcher = self.held.take().ok_or_else(|| LockError::NotLocked {
            path: self.path.clone(),
        })?;
        let pid = watcher.pid();
        watcher.release();
        info!(
            target: LOCK_TARGET,
            path = %self.path.display(),
            pid,
            "lock released"
        );
        Ok(())
    }
}
