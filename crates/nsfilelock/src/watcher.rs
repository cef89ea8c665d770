//! Background release of a held lock.

use std::io;
use std::process::Child;
use std::sync::mpsc::{self, SyncSender};
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::LOCK_TARGET;
use crate::error::LockError;
use crate::launch::terminate;

/// Owns the holder of an acquired lock until it is released.
///
/// The watcher thread performs one blocking wait on a rendezvous channel. A
/// release signal, or the sender being dropped with the handle, terminates
/// the holder, which releases the advisory lock.
#[derive(Debug)]
pub(crate) struct ReleaseWatcher {
    pid: u32,
    release: SyncSender<()>,
    thread: JoinHandle<()>,
}

impl ReleaseWatcher {
    /// Hands `child` to a new watcher thread. If the thread cannot be
    /// started the child is terminated before the error is returned.
    pub(crate) fn start(mut child: Child) -> Result<Self, LockError> {
        let pid = child.id();
        let (handoff, adopt) = mpsc::channel::<Child>();
        let (release, signal) = mpsc::sync_channel::<()>(0);
        let spawned = thread::Builder::new()
            .name(format!("nsfilelock-release-{pid}"))
            .spawn(move || {
                let Ok(mut holder) = adopt.recv() else {
                    return;
                };
                let reason = match signal.recv() {
                    Ok(()) => "unlock requested",
                    Err(_) => "lock handle dropped",
                };
                debug!(target: LOCK_TARGET, pid, reason, "releasing lock");
                terminate(&mut holder);
            });
        let thread = match spawned {
            Ok(thread) => thread,
            Err(source) => {
                terminate(&mut child);
                return Err(LockError::Thread { source });
            }
        };
        if let Err(mpsc::SendError(mut orphan)) = handoff.send(child) {
            terminate(&mut orphan);
            return Err(LockError::Thread {
                source: io::Error::other("release watcher exited before adopting the holder"),
            });
        }
        Ok(Self {
            pid,
            release,
            thread,
        })
    }

    /// Pid of the holder owned by this watcher.
    pub(crate) const fn pid(&self) -> u32 {
        self.pid
    }

    /// Signals the watcher and waits until the holder has been reaped.
    pub(crate) fn release(self) {
        let Self {
            pid,
            release,
            thread,
        } = self;
        if release.send(()).is_err() {
            warn!(
                target: LOCK_TARGET,
                pid,
                "release watcher exited before the release signal"
            );
        }
        if thread.join().is_err() {
            warn!(target: LOCK_TARGET, pid, "release watcher panicked");
        }
    }
}
