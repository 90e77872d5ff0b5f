// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI subcommand implementations.

pub mod backup;
pub mod daemon;
pub mod discover;
pub mod init;
pub mod snapshot;
pub mod status;

use anyhow::{Context, Result};
use bak_core::Config;
use std::path::{Path, PathBuf};

/// Resolve the configuration path: `--config` wins, then `$BAK_CONFIG`,
/// then the per-user default.
pub fn config_path(flag: Option<&Path>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path.to_path_buf()),
        None => Config::default_path().context("could not resolve config path"),
    }
}

/// Load the configuration or explain how to create one.
pub fn load_config(flag: Option<&Path>) -> Result<Config> {
    let path = config_path(flag)?;
    Config::load(&path).with_context(|| {
        format!(
            "could not load configuration from {} (run `bak init` to create one)",
            path.display()
        )
    })
}
