// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: paths, socket setup, stale-socket recovery,
//! shutdown cleanup.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tracing::{info, warn};

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Daemon already running on {0}")]
    AlreadyRunning(PathBuf),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolved daemon paths.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Root state directory (e.g. ~/.local/state/bak)
    pub state_dir: PathBuf,
    /// Unix socket for IPC
    pub socket_path: PathBuf,
    /// Daemon PID file
    pub pid_path: PathBuf,
    /// Daemon log file
    pub log_path: PathBuf,
    /// Backup configuration file
    pub config_path: PathBuf,
    /// Lock file protecting the backup destination
    pub lock_path: PathBuf,
}

impl DaemonConfig {
    /// Resolve paths: `$BAK_STATE_DIR`, else `$XDG_STATE_HOME/bak`, else
    /// `~/.local/state/bak`; the config path honors `$BAK_CONFIG`.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = state_dir()?;
        let config_path =
            bak_core::Config::default_path().map_err(|_| LifecycleError::NoStateDir)?;

        Ok(Self {
            socket_path: state_dir.join("ipc.sock"),
            pid_path: state_dir.join("bakd.pid"),
            log_path: state_dir.join("bakd.log"),
            lock_path: state_dir.join("backup.lock"),
            config_path,
            state_dir,
        })
    }
}

/// Short connect timeout for the stale-socket probe.
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Bind the IPC socket: directory 0700, socket 0600, stale sockets from
/// crashed daemons unlinked, live sockets refused.
pub async fn bind_socket(config: &DaemonConfig) -> Result<UnixListener, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    std::fs::set_permissions(&config.state_dir, std::fs::Permissions::from_mode(0o700))?;

    if config.socket_path.exists() {
        if socket_in_use(&config.socket_path).await {
            return Err(LifecycleError::AlreadyRunning(config.socket_path.clone()));
        }
        warn!(path = %config.socket_path.display(), "removing stale socket");
        std::fs::remove_file(&config.socket_path)?;
    }

    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;
    std::fs::set_permissions(&config.socket_path, std::fs::Permissions::from_mode(0o600))?;

    info!(path = %config.socket_path.display(), "socket bound");
    Ok(listener)
}

/// A refused connection means the socket is an orphan of a dead process.
async fn socket_in_use(path: &Path) -> bool {
    match tokio::time::timeout(PROBE_TIMEOUT, UnixStream::connect(path)).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => false,
        Ok(Err(_)) => false,
        // No response within the probe window: assume a live but busy daemon
        Err(_) => true,
    }
}

/// Record this process as the running daemon.
pub fn write_pid_file(config: &DaemonConfig) -> Result<(), LifecycleError> {
    std::fs::write(&config.pid_path, format!("{}\n", std::process::id()))?;
    Ok(())
}

/// PID of the recorded daemon, if any.
pub fn read_pid_file(config: &DaemonConfig) -> Option<u32> {
    std::fs::read_to_string(&config.pid_path)
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Remove the socket and PID file on shutdown.
pub fn shutdown_cleanup(config: &DaemonConfig) {
    for path in [&config.socket_path, &config.pid_path] {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "failed to remove");
            }
        }
    }
    info!("daemon shutdown cleanup complete");
}

fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("BAK_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("bak"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/bak"))
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
