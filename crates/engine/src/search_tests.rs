// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bak_core::{ExcludeSet, FakeClock};
use std::fs;
use tempfile::tempdir;

fn store_with_two_snapshots(dir: &tempfile::TempDir) -> SnapshotStore {
    let src = dir.path().join("proj");
    fs::create_dir_all(src.join("docs")).unwrap();
    fs::write(src.join("main.rs"), "fn main() {}").unwrap();
    fs::write(src.join("docs/notes.md"), "notes").unwrap();

    let store = SnapshotStore::new(dir.path().join("dest"));
    fs::create_dir(store.destination()).unwrap();

    let clock = FakeClock::new();
    store
        .create(&[src.clone()], &ExcludeSet::default(), &clock, None)
        .unwrap();
    clock.advance(chrono::Duration::seconds(1));
    fs::write(src.join("extra.rs"), "mod extra;").unwrap();
    store
        .create(&[src], &ExcludeSet::default(), &clock, None)
        .unwrap();
    store
}

#[test]
fn searches_across_all_snapshots_newest_first() {
    let dir = tempdir().unwrap();
    let store = store_with_two_snapshots(&dir);

    let matches = search_snapshots(&store, "*.rs", None).unwrap();
    let snapshots: Vec<_> = matches.iter().map(|m| m.snapshot.clone()).collect();
    // Newest snapshot has two .rs files, the older one
    assert_eq!(matches.len(), 3);
    assert!(snapshots[0] >= snapshots[2]);
}

#[test]
fn restricts_to_one_snapshot() {
    let dir = tempdir().unwrap();
    let store = store_with_two_snapshots(&dir);
    let oldest = store.list_snapshots().pop().unwrap();

    let matches = search_snapshots(&store, "*.rs", Some(&oldest.name.to_string())).unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].path, "proj/main.rs");
    assert!(matches[0].size > 0);
}

#[test]
fn matches_full_relative_paths_too() {
    let dir = tempdir().unwrap();
    let store = store_with_two_snapshots(&dir);

    let matches = search_snapshots(&store, "proj/docs/*", None).unwrap();
    assert!(matches.iter().all(|m| m.path == "proj/docs/notes.md"));
    assert!(!matches.is_empty());
}

#[test]
fn unknown_snapshot_is_an_error() {
    let dir = tempdir().unwrap();
    let store = store_with_two_snapshots(&dir);
    assert!(matches!(
        search_snapshots(&store, "*", Some("1999-01-01-000000")),
        Err(SnapshotError::UnknownSnapshot(_))
    ));
}

#[test]
fn invalid_pattern_is_rejected() {
    let dir = tempdir().unwrap();
    let store = store_with_two_snapshots(&dir);
    assert!(search_snapshots(&store, "[", None).is_err());
}
