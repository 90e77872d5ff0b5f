// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status, trigger, and browse: IPC when the daemon runs, with a direct
//! fallback for status so the command works without it.

use super::config_path;
use crate::client::DaemonClient;
use anyhow::{bail, Context, Result};
use bak_core::{Config, SystemClock};
use bak_daemon::lifecycle::DaemonConfig;
use bak_daemon::status::{derive_status, unconfigured};
use bak_daemon::StatusPayload;
use std::path::Path;

pub fn status(config_flag: Option<&Path>) -> Result<()> {
    let client = DaemonClient::from_env()?;

    let payload = if client.is_daemon_running() {
        client.request_status()?
    } else {
        // Daemon down: derive locally from the same inputs
        let daemon = DaemonConfig::load().context("could not resolve daemon paths")?;
        let path = config_path(config_flag)?;
        match Config::load(&path) {
            Ok(config) => derive_status(&config, &daemon.lock_path, &SystemClock),
            Err(bak_core::ConfigError::Missing(_)) => unconfigured(),
            Err(e) => return Err(e.into()),
        }
    };

    print_status(&payload);
    Ok(())
}

fn print_status(payload: &StatusPayload) {
    println!("status:      {:?}", payload.status);
    println!("message:     {}", payload.message);
    println!("snapshots:   {}", payload.total_snapshots);
    if let Some(last) = &payload.last_backup {
        println!("last backup: {last}");
    }
    if let Some(next) = &payload.next_backup {
        println!("next backup: {next}");
    }
    println!(
        "destination: {}",
        if payload.destination_available {
            "available"
        } else {
            "not available"
        }
    );
    if payload.is_running {
        println!("a backup is running right now");
    }
}

pub fn trigger() -> Result<()> {
    let client = DaemonClient::from_env()?;
    if !client.is_daemon_running() {
        bail!("daemon not running; start it with `bak daemon start` or run `bak backup`");
    }

    let payload = client.trigger_backup()?;
    if !payload.success {
        bail!("{}", payload.message);
    }
    match (payload.snapshot, payload.files_transferred) {
        (Some(snapshot), Some(files)) => {
            println!("backup complete: {snapshot} ({files} files)")
        }
        _ => println!("{}", payload.message),
    }
    Ok(())
}

pub fn browse() -> Result<()> {
    let client = DaemonClient::from_env()?;
    if client.is_daemon_running() {
        let payload = client.request_browse()?;
        match payload.path {
            Some(path) if payload.success => println!("{path}"),
            Some(path) => bail!("{} ({path})", payload.message),
            None => bail!("{}", payload.message),
        }
        return Ok(());
    }

    // Without the daemon the destination comes straight from the config
    let config = super::load_config(None)?;
    if !config.backup_destination.is_dir() {
        bail!(
            "backup destination not available: {}",
            config.backup_destination.display()
        );
    }
    println!("{}", config.backup_destination.display());
    Ok(())
}
