//! Advisory file locks held inside another mount namespace.
//!
//! A process running in a container often needs to coordinate with software
//! on the host (or in a sibling container) that guards shared state with an
//! advisory `flock(2)` on a path only visible in its own mount namespace.
//! [`NsFileLock`] acquires such a lock on the caller's behalf: each lock
//! cycle spawns a small holder process (`nsfilelock-holder`) that joins the
//! target mount namespace, opens the file, blocks on an exclusive lock and
//! reports `locked` on stdout. The caller waits for that answer up to a
//! configurable timeout; the holder keeps the lock until it is terminated by
//! [`NsFileLock::unlock`], by dropping the handle, or by the death of the
//! thread that spawned it.
//!
//! Lock state is never polled. Each attempt makes a single blocking wait on
//! a channel fed by two stream readers, and release is a one-shot signal to
//! a watcher thread that terminates and reaps the holder.
//!
//! Diagnostics are emitted with [`tracing`] under the `nsfilelock::lock` and
//! `nsfilelock::process` targets. The library never installs a subscriber;
//! the `nsfilelock` binary calls [`telemetry::initialise`].

mod arbiter;
pub mod cli;
mod error;
mod holder;
mod launch;
mod lock;
mod namespace;
mod options;
mod response;
pub mod telemetry;
mod watcher;

pub use error::{HoldError, LockError};
pub use holder::{
    BUSY_RESPONSE, HoldRequest, SUCCESS_RESPONSE, acquire, announce, enter_namespace, hold,
    try_acquire,
};
pub use launch::{HolderLauncher, SystemLauncher};
pub use lock::NsFileLock;
pub use namespace::{DEFAULT_NAMESPACE, MOUNT_NAMESPACE_HANDLE, Namespace};
pub use options::{
    DEFAULT_TIMEOUT, HOLDER_ENV_VAR, HOLDER_PROGRAM, LockOptions, MAXIMUM_MESSAGE_SIZE,
};
pub use response::Stream;

/// Tracing target for lock lifecycle events.
pub(crate) const LOCK_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lock");

/// Tracing target for holder process management.
pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
