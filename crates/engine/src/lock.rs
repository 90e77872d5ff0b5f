// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-writer backup lock.
//!
//! An advisory flock on the lock file is authoritative; the PID written
//! into the file is diagnostic and the hint for stale recovery. Stale
//! detection happens strictly AFTER the flock is held — checking first
//! would let two processes both decide a dead holder's lock is takeable.

use fs2::FileExt;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Lock acquisition errors
#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock held by running process {holder}")]
    HeldByProcess { holder: u32 },

    #[error("lock still held after timeout{}", .holder.map(|p| format!(" (holder pid {p})")).unwrap_or_default())]
    Timeout { holder: Option<u32> },

    #[error("lock file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exclusive advisory lock over a backup destination.
///
/// Released (and the lock file removed) on `release()` or on drop.
#[derive(Debug)]
pub struct BackupLock {
    path: PathBuf,
    file: Option<File>,
}

impl BackupLock {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
    const POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Acquire the lock, waiting up to `timeout` in 100 ms polls.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Open without truncating so a running holder's PID is preserved
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(0o600)
            .open(path)?;

        let start = Instant::now();
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    // Flock held: now safe to inspect the prior holder
                    if let Some(prior) = read_pid(&mut file) {
                        if prior != std::process::id() && process_alive(prior) {
                            let _ = FileExt::unlock(&file);
                            return Err(LockError::HeldByProcess { holder: prior });
                        }
                        if prior != std::process::id() {
                            warn!(holder = prior, "taking over stale lock");
                        }
                    }

                    file.set_len(0)?;
                    file.seek(SeekFrom::Start(0))?;
                    write!(file, "{}", std::process::id())?;
                    file.flush()?;

                    debug!(path = %path.display(), "lock acquired");
                    return Ok(Self {
                        path: path.to_path_buf(),
                        file: Some(file),
                    });
                }
                Err(e) if is_contended(&e) => {
                    if start.elapsed() >= timeout {
                        return Err(LockError::Timeout {
                            holder: Self::holder_pid(path),
                        });
                    }
                    std::thread::sleep(Self::POLL_INTERVAL);
                }
                Err(e) => return Err(LockError::Io(e)),
            }
        }
    }

    /// Release the lock and remove the lock file. Idempotent.
    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
            drop(file);
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
                }
            }
            debug!(path = %self.path.display(), "lock released");
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Probe whether the lock is currently held, without acquiring it.
    pub fn is_locked(path: &Path) -> bool {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(_) => return false,
        };
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                false
            }
            Err(e) => is_contended(&e),
        }
    }

    /// PID recorded in the lock file, if any.
    pub fn holder_pid(path: &Path) -> Option<u32> {
        let content = std::fs::read_to_string(path).ok()?;
        content.trim().parse().ok()
    }
}

impl Drop for BackupLock {
    fn drop(&mut self) {
        self.release();
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

fn read_pid(file: &mut File) -> Option<u32> {
    file.seek(SeekFrom::Start(0)).ok()?;
    let mut content = String::new();
    file.read_to_string(&mut content).ok()?;
    content.trim().parse().ok()
}

/// Signal-0 liveness probe: ESRCH means dead, EPERM means alive but
/// not ours.
fn process_alive(pid: u32) -> bool {
    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
