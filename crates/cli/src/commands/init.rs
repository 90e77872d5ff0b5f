// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `bak init`: discover projects, pick a destination, write the config.

use super::config_path;
use anyhow::{bail, Context, Result};
use bak_engine::discover::{DestinationRoots, DiskCapacityProbe};
use bak_engine::{
    discover_destinations, discover_projects, generate_config, recommend_destination,
    DiscoverOptions, DiscoveredDestination,
};
use std::path::Path;

pub fn run(
    config_flag: Option<&Path>,
    workspace: Option<&Path>,
    destination: Option<&Path>,
    force: bool,
) -> Result<()> {
    let path = config_path(config_flag)?;
    if path.exists() && !force {
        bail!(
            "configuration already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    let projects = discover_projects(&DiscoverOptions::default(), workspace);
    if projects.is_empty() {
        bail!("no projects found; nothing to back up");
    }
    println!("found {} projects", projects.len());

    let chosen: DiscoveredDestination = match destination {
        Some(dest) => manual_destination(dest),
        None => {
            let destinations =
                discover_destinations(&DestinationRoots::default(), &DiskCapacityProbe);
            let (best, reason) =
                recommend_destination(&destinations).context("no usable backup destination found")?;
            println!("using {}: {reason}", best.path.display());
            best.clone()
        }
    };

    let config = generate_config(&projects, &chosen)?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, config.to_toml()?)
        .with_context(|| format!("could not write {}", path.display()))?;

    println!("wrote {}", path.display());
    println!(
        "backing up {} sources to {}",
        config.source_directories.len(),
        config.backup_destination.display()
    );
    Ok(())
}

/// Wrap an explicit destination path in a discovery record so config
/// generation treats it like a discovered one.
fn manual_destination(path: &Path) -> DiscoveredDestination {
    use bak_engine::discover::{classify_destination, recommendation_score};
    use bak_engine::CapacityProbe;

    let roots = DestinationRoots::default();
    let (available, total) = DiskCapacityProbe.capacity(path);
    let (destination_type, is_removable) = classify_destination(path, &roots.volume_roots);
    DiscoveredDestination {
        path: path.to_path_buf(),
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
        destination_type,
        available_bytes: available,
        total_bytes: total,
        is_removable,
        recommendation_score: recommendation_score(destination_type, available, total),
    }
}
