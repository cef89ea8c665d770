//! A lock abandoned by its owning thread is released by the kernel.
//!
//! The holder is armed with a parent-death signal tied to the thread that
//! spawned it, so a handle that is leaked rather than unlocked or dropped
//! still frees the lock once that thread exits.

use std::mem;
use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use nsfilelock::{LockOptions, NsFileLock};
use tempfile::TempDir;

const OWN_NAMESPACE: &str = "/proc/self/ns";
const HOLDER: &str = env!("CARGO_BIN_EXE_nsfilelock-holder");

fn handle(target: &Path) -> NsFileLock {
    NsFileLock::with_options(
        OWN_NAMESPACE,
        target,
        LockOptions::new()
            .timeout(Duration::from_secs(5))
            .holder(HOLDER),
    )
}

#[test]
fn leaked_lock_is_released_when_its_thread_exits() {
    let dir = TempDir::new().expect("temp dir");
    let target = dir.path().join("abandoned.lock");

    let owner_target = target.clone();
    thread::spawn(move || {
        let mut lock = handle(&owner_target);
        lock.lock().expect("owner thread should acquire a free lock");
        // Neither unlock nor drop runs; only the thread exit can free it.
        mem::forget(lock);
    })
    .join()
    .expect("owner thread");

    let mut successor = handle(&target);
    successor
        .lock()
        .expect("lock should be free once the owning thread has exited");
    successor.unlock().expect("unlock");
}

#[test]
fn leaked_lock_stays_held_while_its_thread_lives() {
    let dir = TempDir::new().expect("temp dir");
    let target = dir.path().join("owned.lock");

    let owner_target = target.clone();
    let (locked_tx, locked_rx) = mpsc::channel();
    let (finish_tx, finish_rx) = mpsc::channel::<()>();
    let owner = thread::spawn(move || {
        let mut lock = handle(&owner_target);
        lock.lock().expect("owner thread should acquire a free lock");
        mem::forget(lock);
        locked_tx.send(()).expect("report lock");
        finish_rx.recv().expect("wait for contender");
    });
    locked_rx.recv().expect("owner locked");

    let mut contender = NsFileLock::with_options(
        OWN_NAMESPACE,
        &target,
        LockOptions::new()
            .timeout(Duration::from_millis(300))
            .holder(HOLDER),
    );
    let error = contender
        .lock()
        .expect_err("lock should stay held while the owner thread runs");
    assert!(error.is_timeout(), "unexpected error: {error}");

    finish_tx.send(()).expect("release owner");
    owner.join().expect("owner thread");
    let mut successor = handle(&target);
    successor
        .lock()
        .expect("lock should be free once the owning thread has exited");
    successor.unlock().expect("unlock");
}
