// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon management: start (detached), stop (SIGTERM), status.

use crate::client::DaemonClient;
use anyhow::{bail, Context, Result};
use bak_daemon::lifecycle::{read_pid_file, DaemonConfig};
use clap::Subcommand;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io::BufRead;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start the daemon in the background
    Start,
    /// Stop a running daemon
    Stop,
    /// Report whether the daemon is running
    Status,
}

pub fn run(action: DaemonAction) -> Result<()> {
    match action {
        DaemonAction::Start => start(),
        DaemonAction::Stop => stop(),
        DaemonAction::Status => status(),
    }
}

/// How long to wait for READY after spawning bakd.
const START_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for the socket to disappear after SIGTERM.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

fn start() -> Result<()> {
    let config = DaemonConfig::load()?;
    let client = DaemonClient::new(&config.socket_path);
    if client.is_daemon_running() {
        println!("daemon already running");
        return Ok(());
    }

    let binary = daemon_binary()?;
    let mut child = Command::new(&binary)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to spawn {}", binary.display()))?;

    // Wait for the readiness marker so failures surface here, not later
    let stdout = child.stdout.take().context("no stdout from daemon")?;
    let mut reader = std::io::BufReader::new(stdout);
    let deadline = Instant::now() + START_TIMEOUT;
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => {
                let _ = child.wait();
                bail!("daemon exited during startup (see {})", config.log_path.display());
            }
            Ok(_) if line.trim() == "READY" => break,
            Ok(_) => {}
            Err(e) => bail!("failed to read daemon startup output: {e}"),
        }
        if Instant::now() > deadline {
            bail!("daemon did not become ready in time");
        }
    }

    println!(
        "daemon started (pid {}, socket {})",
        child.id(),
        config.socket_path.display()
    );
    Ok(())
}

fn stop() -> Result<()> {
    let config = DaemonConfig::load()?;
    let client = DaemonClient::new(&config.socket_path);

    let Some(pid) = read_pid_file(&config) else {
        if client.is_daemon_running() {
            bail!("daemon is running but has no pid file; stop it manually");
        }
        println!("daemon not running");
        return Ok(());
    };

    if !client.is_daemon_running() {
        println!("daemon not running (stale pid file)");
        return Ok(());
    }

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
        .with_context(|| format!("failed to signal daemon pid {pid}"))?;

    let deadline = Instant::now() + STOP_TIMEOUT;
    while Instant::now() < deadline {
        if !client.is_daemon_running() {
            println!("daemon stopped");
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    bail!("daemon did not stop within {STOP_TIMEOUT:?}");
}

fn status() -> Result<()> {
    let config = DaemonConfig::load()?;
    let client = DaemonClient::new(&config.socket_path);

    if client.is_daemon_running() {
        match read_pid_file(&config) {
            Some(pid) => println!("daemon running (pid {pid})"),
            None => println!("daemon running"),
        }
    } else {
        println!("daemon not running");
    }
    Ok(())
}

/// bakd lives next to the bak binary; `BAK_DAEMON_BINARY` overrides for
/// tests.
fn daemon_binary() -> Result<std::path::PathBuf> {
    if let Ok(path) = std::env::var("BAK_DAEMON_BINARY") {
        return Ok(path.into());
    }
    let exe = std::env::current_exe().context("cannot locate own binary")?;
    Ok(exe.with_file_name("bakd"))
}
