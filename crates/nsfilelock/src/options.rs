//! Tunables applied to each lock cycle.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Maximum time a lock attempt waits for the holder to answer.
///
/// Also bounds how long a zero-timeout attempt waits for a non-blocking
/// holder to start and report.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Upper bound, in bytes, on a single response line read from the holder.
///
/// Longer lines are truncated at this size; the remainder is discarded.
pub const MAXIMUM_MESSAGE_SIZE: usize = 255;

/// Environment variable overriding the holder program location.
pub const HOLDER_ENV_VAR: &str = "NSFILELOCK_HOLDER";

/// File name of the holder binary shipped with this crate.
pub const HOLDER_PROGRAM: &str = "nsfilelock-holder";

/// Per-handle configuration for lock attempts.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use nsfilelock::LockOptions;
///
/// let options = LockOptions::new()
///     .timeout(Duration::from_secs(3))
///     .holder("/usr/local/bin/nsfilelock-holder");
/// assert_eq!(options.timeout_duration(), Duration::from_secs(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    timeout: Duration,
    max_message_size: usize,
    holder: Option<PathBuf>,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl LockOptions {
    /// Creates options with the default timeout and message cap.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_message_size: MAXIMUM_MESSAGE_SIZE,
            holder: None,
        }
    }

    /// Overrides the acquisition timeout. A zero timeout turns each attempt
    /// into a try-lock: a free lock is taken, a held one fails at once.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the per-line response cap. Values below one byte are raised
    /// to one.
    #[must_use]
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes.max(1);
        self
    }

    /// Pins the holder program instead of resolving it from the environment.
    #[must_use]
    pub fn holder(mut self, program: impl Into<PathBuf>) -> Self {
        self.holder = Some(program.into());
        self
    }

    /// Configured acquisition timeout.
    #[must_use]
    pub const fn timeout_duration(&self) -> Duration {
        self.timeout
    }

    /// Configured per-line response cap in bytes.
    #[must_use]
    pub const fn message_limit(&self) -> usize {
        self.max_message_size
    }

    /// Resolves the holder program to spawn.
    ///
    /// Resolution order: the explicit builder value, `NSFILELOCK_HOLDER`, a
    /// `nsfilelock-holder` binary beside the current executable, and finally
    /// the bare program name so the spawn falls back to a `PATH` lookup.
    #[must_use]
    pub fn holder_program(&self) -> PathBuf {
        if let Some(program) = &self.holder {
            return program.clone();
        }
        resolve_holder(env::var_os(HOLDER_ENV_VAR), env::current_exe().ok().as_deref())
    }
}

fn resolve_holder(from_env: Option<OsString>, current_exe: Option<&Path>) -> PathBuf {
    if let Some(program) = from_env.filter(|value| !value.is_empty()) {
        return PathBuf::from(program);
    }
    current_exe
        .and_then(Path::parent)
        .map(|dir| dir.join(HOLDER_PROGRAM))
        .filter(|candidate| candidate.is_file())
        .unwrap_or_else(|| PathBuf::from(HOLDER_PROGRAM))
}
