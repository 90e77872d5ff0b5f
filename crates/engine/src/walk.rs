// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exclude-aware filesystem walk.
//!
//! Symbolic links are never followed: entries are classified by
//! `symlink_metadata`, so a link to a directory is visited as a link, not
//! descended into. A visited-(device, inode) set guards against cycles
//! that could still arise from bind mounts or hard-linked directories.

use bak_core::ExcludeSet;
use std::collections::HashSet;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// What a walk entry is, as seen by `symlink_metadata`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
    Symlink,
    Other,
}

/// One entry yielded by the walk.
pub struct WalkEntry<'a> {
    /// Absolute path of the entry
    pub path: &'a Path,
    /// Path relative to the walk root
    pub rel: &'a Path,
    pub kind: EntryKind,
    pub meta: &'a Metadata,
}

fn classify(meta: &Metadata) -> EntryKind {
    let ft = meta.file_type();
    if ft.is_symlink() {
        EntryKind::Symlink
    } else if ft.is_dir() {
        EntryKind::Dir
    } else if ft.is_file() {
        EntryKind::File
    } else {
        EntryKind::Other
    }
}

/// Walk `root` depth-first, pre-order, pruning excluded names and never
/// following symlinks. Unreadable entries are skipped. The root itself is
/// not yielded; a single-file root is yielded as one entry.
pub fn walk(root: &Path, excludes: &ExcludeSet, visit: &mut dyn FnMut(&WalkEntry)) {
    let root_meta = match std::fs::symlink_metadata(root) {
        Ok(meta) => meta,
        Err(e) => {
            debug!(path = %root.display(), error = %e, "walk root unreadable");
            return;
        }
    };

    if !root_meta.is_dir() {
        let rel = PathBuf::from(root.file_name().unwrap_or(root.as_os_str()));
        visit(&WalkEntry {
            path: root,
            rel: &rel,
            kind: classify(&root_meta),
            meta: &root_meta,
        });
        return;
    }

    let mut visited: HashSet<(u64, u64)> = HashSet::new();
    visited.insert((root_meta.dev(), root_meta.ino()));
    walk_dir(root, Path::new(""), excludes, &mut visited, visit);
}

fn walk_dir(
    dir: &Path,
    rel: &Path,
    excludes: &ExcludeSet,
    visited: &mut HashSet<(u64, u64)>,
    visit: &mut dyn FnMut(&WalkEntry),
) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "skipping unreadable directory");
            return;
        }
    };

    let mut children: Vec<_> = entries.filter_map(|e| e.ok()).collect();
    children.sort_by_key(|e| e.file_name());

    for child in children {
        let path = child.path();
        let meta = match std::fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let kind = classify(&meta);
        let child_rel = rel.join(child.file_name());

        if excludes.is_excluded(&child_rel, kind == EntryKind::Dir) {
            continue;
        }

        visit(&WalkEntry {
            path: &path,
            rel: &child_rel,
            kind,
            meta: &meta,
        });

        if kind == EntryKind::Dir {
            if !visited.insert((meta.dev(), meta.ino())) {
                debug!(path = %path.display(), "directory already visited, skipping");
                continue;
            }
            walk_dir(&path, &child_rel, excludes, visited, visit);
        }
    }
}

#[cfg(test)]
#[path = "walk_tests.rs"]
mod tests;
