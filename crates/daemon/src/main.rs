// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! bak daemon (bakd)
//!
//! Background process serving the IPC socket and the backup schedule.
//!
//! Architecture:
//! - Listener task: per-connection request/response handling
//! - Scheduler task: interval-driven backup runs on the blocking pool
//! - Main task: signal handling and shutdown

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;

use bak_daemon::lifecycle::{self, DaemonConfig, LifecycleError};
use bak_daemon::listener::{ListenCtx, Listener};
use bak_daemon::scheduler::spawn_scheduler;
use bak_engine::CleanupHandle;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("bakd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("bakd {}", env!("CARGO_PKG_VERSION"));
                println!("bak daemon - serves backup status and triggers over a local socket");
                println!();
                println!("USAGE:");
                println!("    bakd");
                println!();
                println!("The daemon is typically started by `bak daemon start` and should");
                println!("not be invoked directly. It listens on a user-private Unix socket");
                println!("for requests from `bak` and the menu bar app.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: bakd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = DaemonConfig::load()?;

    rotate_log_if_needed(&config);

    let _log_guard = setup_logging(&config)?;
    info!("starting bak daemon");

    let unix_listener = match lifecycle::bind_socket(&config).await {
        Ok(listener) => listener,
        Err(LifecycleError::AlreadyRunning(path)) => {
            let pid = lifecycle::read_pid_file(&config)
                .map(|p| p.to_string())
                .unwrap_or_default();
            eprintln!("bakd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            eprintln!("  socket: {}", path.display());
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "failed to start daemon");
            return Err(e.into());
        }
    };

    lifecycle::write_pid_file(&config)?;

    let ctx = Arc::new(ListenCtx {
        config_path: config.config_path.clone(),
        lock_path: config.lock_path.clone(),
        cleanup: CleanupHandle::new(),
    });

    tokio::spawn(Listener::new(unix_listener, Arc::clone(&ctx)).run());
    spawn_scheduler(Arc::clone(&ctx));

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(socket = %config.socket_path.display(), "daemon ready");

    // Readiness marker for the CLI waiting on startup
    println!("READY");

    let signo = tokio::select! {
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down");
            libc_signo::SIGTERM
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down");
            libc_signo::SIGINT
        }
    };

    // A backup may be mid-flight on the blocking pool; apply its cleanup
    // (staging removal, lock release) before exiting.
    ctx.cleanup.cleanup();
    lifecycle::shutdown_cleanup(&config);
    info!("daemon stopped");
    std::process::exit(128 + signo);
}

/// Signal numbers used in the exit-status contract.
mod libc_signo {
    pub const SIGINT: i32 = 2;
    pub const SIGTERM: i32 = 15;
}

/// Rotate the daemon log by size, keeping a bounded number of older
/// files (`bakd.log.1` … `bakd.log.N`). Best-effort; parameters come
/// from the backup configuration when it is readable.
fn rotate_log_if_needed(config: &DaemonConfig) {
    let (max_bytes, keep) = match bak_core::Config::load(&config.config_path) {
        Ok(c) => (c.logging.max_size_mb * 1024 * 1024, c.logging.backup_count),
        Err(_) => (10 * 1024 * 1024, 3),
    };

    let size = match std::fs::metadata(&config.log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < max_bytes || keep == 0 {
        return;
    }

    let log = config.log_path.display().to_string();
    for i in (1..keep).rev() {
        let _ = std::fs::rename(format!("{log}.{i}"), format!("{log}.{}", i + 1));
    }
    let _ = std::fs::rename(&config.log_path, format!("{log}.1"));
}

fn setup_logging(
    config: &DaemonConfig,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(&config.state_dir)?;

    let file_appender = tracing_appender::rolling::never(
        &config.state_dir,
        config
            .log_path
            .file_name()
            .ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Level from the backup config unless RUST_LOG overrides
    let default_level = bak_core::Config::load(&config.config_path)
        .map(|c| c.logging.level)
        .unwrap_or_else(|_| "info".to_string());
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
