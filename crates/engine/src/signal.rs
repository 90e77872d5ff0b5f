// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Signal-safe cleanup for backup runs.
//!
//! Signal disposition is process-global, so exactly one owner installs the
//! SIGTERM/SIGINT hooks, and only from the main thread. Anywhere else
//! (tests, the daemon's worker threads) the same cleanup state is kept and
//! applied via `cleanup()` by whoever owns shutdown there.
//!
//! On a termination signal: terminate a registered copier child (TERM,
//! 5 s grace, then KILL), remove the staging directory, release the lock,
//! exit `128 + signo`.

use crate::lock::BackupLock;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::path::{Path, PathBuf};
use std::process::Child;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Grace period between TERM and KILL for the copier child.
const CHILD_TERM_GRACE: Duration = Duration::from_secs(5);

/// Cooperative stop flag polled by the in-process copier.
#[derive(Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct CleanupState {
    in_progress: Option<PathBuf>,
    lock: Option<BackupLock>,
    copier: Option<Child>,
}

/// Shared handle to the cleanup state of one backup run.
#[derive(Clone, Default)]
pub struct CleanupHandle {
    state: Arc<Mutex<CleanupState>>,
    cancel: CancelFlag,
}

impl CleanupHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the staging directory once it exists.
    pub fn set_in_progress(&self, path: PathBuf) {
        self.state.lock().in_progress = Some(path);
    }

    /// Forget the staging directory (after the commit rename).
    pub fn clear_in_progress(&self) {
        self.state.lock().in_progress = None;
    }

    /// Hand the held lock to the cleanup state.
    pub fn set_lock(&self, lock: BackupLock) {
        self.state.lock().lock = Some(lock);
    }

    /// Take the lock back for an orderly release.
    pub fn take_lock(&self) -> Option<BackupLock> {
        self.state.lock().lock.take()
    }

    /// Register an external copier subprocess for termination on signal.
    pub fn set_copier_process(&self, child: Child) {
        self.state.lock().copier = Some(child);
    }

    pub fn clear_copier(&self) -> Option<Child> {
        self.state.lock().copier.take()
    }

    /// Stop flag shared with the in-process copier.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Perform the cleanup actions without exiting. Returns true if
    /// anything was cleaned up.
    pub fn cleanup(&self) -> bool {
        // Ask the in-process copier to stop writing before the staging
        // directory is removed underneath it
        self.cancel.set();

        let mut state = self.state.lock();
        let mut cleaned = false;

        if let Some(mut child) = state.copier.take() {
            terminate_child(&mut child);
            cleaned = true;
        }

        if let Some(path) = state.in_progress.take() {
            if path.exists() && remove_staging(&path) {
                info!(path = %path.display(), "removed staging directory");
                cleaned = true;
            }
        }

        if let Some(mut lock) = state.lock.take() {
            lock.release();
            cleaned = true;
        }

        cleaned
    }
}

/// Remove the staging tree, retrying while in-flight writes from the
/// copier drain.
fn remove_staging(path: &Path) -> bool {
    let mut last_err = None;
    for _ in 0..20 {
        match std::fs::remove_dir_all(path) {
            Ok(()) => return true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) => {
                last_err = Some(e);
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }
    if let Some(e) = last_err {
        warn!(path = %path.display(), error = %e, "failed to remove staging directory");
    }
    false
}

/// TERM, wait up to the grace period, then KILL.
fn terminate_child(child: &mut Child) {
    let pid = Pid::from_raw(child.id() as i32);
    let _ = kill(pid, Signal::SIGTERM);

    let deadline = Instant::now() + CHILD_TERM_GRACE;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) if Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(100));
            }
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "failed to wait for copier child");
                break;
            }
        }
    }

    warn!("copier did not exit after TERM, killing");
    let _ = child.kill();
    let _ = child.wait();
}

/// Owner of the process-global SIGTERM/SIGINT disposition for the
/// duration of one backup run.
pub struct SignalHandler {
    handle: CleanupHandle,
    signals: Option<signal_hook::iterator::Handle>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SignalHandler {
    /// Install the handlers and return the owner. Off the main thread the
    /// disposition is left untouched and the handle only records state for
    /// a later passive `cleanup()`.
    pub fn register() -> Self {
        let handle = CleanupHandle::new();
        Self::register_with(handle)
    }

    pub fn register_with(handle: CleanupHandle) -> Self {
        if !on_main_thread() {
            debug!("not on main thread, signal handlers not installed");
            return Self {
                handle,
                signals: None,
                thread: None,
            };
        }

        let mut signals = match Signals::new([SIGTERM, SIGINT]) {
            Ok(signals) => signals,
            Err(e) => {
                warn!(error = %e, "failed to install signal handlers");
                return Self {
                    handle,
                    signals: None,
                    thread: None,
                };
            }
        };

        let sig_handle = signals.handle();
        let cleanup = handle.clone();
        let thread = std::thread::spawn(move || {
            if let Some(signo) = signals.forever().next() {
                info!(signal = signo, "termination signal received, cleaning up");
                cleanup.cleanup();
                std::process::exit(128 + signo);
            }
        });

        debug!("signal handlers installed");
        Self {
            handle,
            signals: Some(sig_handle),
            thread: Some(thread),
        }
    }

    /// Cleanup state shared with the run.
    pub fn handle(&self) -> CleanupHandle {
        self.handle.clone()
    }

    pub fn is_installed(&self) -> bool {
        self.signals.is_some()
    }

    /// Restore the previous signal disposition.
    pub fn unregister(&mut self) {
        if let Some(signals) = self.signals.take() {
            signals.close();
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SignalHandler {
    fn drop(&mut self) {
        self.unregister();
    }
}

/// The main thread of a Rust program is the only one named "main".
fn on_main_thread() -> bool {
    std::thread::current().name() == Some("main")
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
