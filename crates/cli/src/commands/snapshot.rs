// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-side snapshot commands: list, diff, search, restore, verify.

use super::load_config;
use crate::output::{human_bytes, print_columns};
use anyhow::{bail, Context, Result};
use bak_core::ExcludeSet;
use bak_engine::{
    diff_snapshot, restore as restore_op, search_snapshots, verify_snapshot, SnapshotStore,
};
use std::path::Path;

pub fn list(config_flag: Option<&Path>) -> Result<()> {
    let config = load_config(config_flag)?;
    let store = SnapshotStore::new(&config.backup_destination);
    let snapshots = store.list_snapshots();

    if snapshots.is_empty() {
        println!("no snapshots yet");
        return Ok(());
    }

    let rows: Vec<(String, String)> = snapshots
        .iter()
        .map(|s| (s.name.to_string(), s.path.display().to_string()))
        .collect();
    print_columns(&rows);
    Ok(())
}

pub fn diff(
    config_flag: Option<&Path>,
    snapshot: Option<&str>,
    sub_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_flag)?;
    let store = SnapshotStore::new(&config.backup_destination);
    let entry = match snapshot {
        Some(name) => store.get_by_timestamp(name)?,
        None => store.latest().context("no snapshots to diff against")?,
    };

    let excludes = ExcludeSet::new(&config.exclude_patterns);
    let report = diff_snapshot(&entry, &config.source_directories, &excludes, sub_path)?;

    if report.is_clean() {
        println!("no changes since {}", entry.name);
        return Ok(());
    }
    for path in &report.added {
        println!("A {path}");
    }
    for path in &report.modified {
        println!("M {path}");
    }
    for path in &report.deleted {
        println!("D {path}");
    }
    Ok(())
}

pub fn search(
    config_flag: Option<&Path>,
    pattern: &str,
    snapshot: Option<&str>,
) -> Result<()> {
    let config = load_config(config_flag)?;
    let store = SnapshotStore::new(&config.backup_destination);
    let matches = search_snapshots(&store, pattern, snapshot)?;

    if matches.is_empty() {
        println!("no matches for {pattern}");
        return Ok(());
    }
    let rows: Vec<(String, String)> = matches
        .iter()
        .map(|m| {
            (
                format!("{}/{}", m.snapshot, m.path),
                human_bytes(m.size),
            )
        })
        .collect();
    print_columns(&rows);
    Ok(())
}

pub fn restore(
    config_flag: Option<&Path>,
    snapshot: &str,
    path: &str,
    to: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_flag)?;
    let store = SnapshotStore::new(&config.backup_destination);

    let outcome = restore_op(&store, snapshot, path, to)?;
    println!(
        "restored {} files to {}",
        outcome.files_restored,
        outcome.restored_to.display()
    );
    Ok(())
}

pub fn verify(
    config_flag: Option<&Path>,
    snapshot: Option<&str>,
    pattern: Option<&str>,
) -> Result<()> {
    let config = load_config(config_flag)?;
    let store = SnapshotStore::new(&config.backup_destination);
    let name = match snapshot {
        Some(name) => name.to_string(),
        None => {
            store
                .latest()
                .context("no snapshots to verify")?
                .name
                .to_string()
        }
    };

    let report = verify_snapshot(&store, &name, pattern)?;
    println!(
        "{name}: {} verified, {} failed",
        report.files_verified, report.files_failed
    );
    for path in &report.missing_files {
        println!("missing   {path}");
    }
    for path in &report.corrupted_files {
        println!("corrupted {path}");
    }
    for err in &report.errors {
        println!("error     {err}");
    }

    if !report.is_clean() {
        bail!("snapshot {name} failed verification");
    }
    Ok(())
}
