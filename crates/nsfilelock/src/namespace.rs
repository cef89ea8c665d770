//! Target namespace identification and validation.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LockError;

/// Namespace directory used when the caller does not name one: the
/// namespaces of the init process, i.e. the host.
pub const DEFAULT_NAMESPACE: &str = "/proc/1/ns";

/// Name of the mount namespace handle inside a namespace directory.
pub const MOUNT_NAMESPACE_HANDLE: &str = "mnt";

/// A `/proc/<pid>/ns`-style directory identifying the target namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    dir: PathBuf,
}

impl Namespace {
    /// Wraps a namespace directory. An empty path selects
    /// [`DEFAULT_NAMESPACE`].
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref();
        if path.as_os_str().is_empty() {
            Self::host()
        } else {
            Self {
                dir: path.to_path_buf(),
            }
        }
    }

    /// Namespaces of the init process.
    #[must_use]
    pub fn host() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_NAMESPACE),
        }
    }

    /// Namespace directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the mount namespace handle.
    #[must_use]
    pub fn mount_handle(&self) -> PathBuf {
        self.dir.join(MOUNT_NAMESPACE_HANDLE)
    }

    /// Confirms the mount namespace handle exists and can be inspected.
    ///
    /// Runs before any process is spawned so a bad namespace never leaves a
    /// holder behind.
    ///
    /// # Errors
    ///
    /// Returns [`LockError::InvalidNamespace`] when the handle is missing or
    /// inaccessible.
    pub fn validate(&self) -> Result<PathBuf, LockError> {
        let handle = self.mount_handle();
        if let Err(source) = fs::metadata(&handle) {
            return Err(LockError::InvalidNamespace { handle, source });
        }
        Ok(handle)
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self::host()
    }
}
