//! Fresh-backup, incremental hard-link, and retention specs.

use crate::prelude::*;
use std::os::unix::fs::MetadataExt;

#[test]
fn fresh_backup_commits_one_snapshot_with_manifest() {
    let sandbox = Sandbox::new();

    let output = sandbox.bak(&["backup"]).output().unwrap();
    assert!(
        output.status.success(),
        "backup failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let names = sandbox.snapshot_names();
    assert_eq!(names.len(), 1, "expected exactly one snapshot: {names:?}");
    assert!(sandbox.staging_names().is_empty());

    let snapshot = sandbox.destination.join(&names[0]);
    let copied = snapshot.join("proj/a.txt");
    assert_eq!(std::fs::read(&copied).unwrap(), b"hello");

    // Manifest lists the file with its true digest
    let manifest: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(snapshot.join(".devbackup-manifest")).unwrap(),
    )
    .unwrap();
    let entries = manifest["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["path"], "proj/a.txt");
    assert_eq!(entries[0]["size"], 5);
    assert_eq!(
        entries[0]["sha256"],
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );

    // Lock is released and removed
    assert!(!sandbox.lock_path().exists());
}

#[test]
fn unchanged_file_shares_an_inode_across_snapshots() {
    let sandbox = Sandbox::new();

    assert!(sandbox.bak(&["backup"]).status().unwrap().success());
    // Snapshot names have 1 s resolution
    std::thread::sleep(std::time::Duration::from_millis(1100));
    assert!(sandbox.bak(&["backup"]).status().unwrap().success());

    let names = sandbox.snapshot_names();
    assert_eq!(names.len(), 2);

    let ino = |name: &str| {
        std::fs::metadata(sandbox.destination.join(name).join("proj/a.txt"))
            .unwrap()
            .ino()
    };
    assert_eq!(ino(&names[0]), ino(&names[1]));
}

#[test]
fn retention_keeps_only_the_newest_with_hourly_one() {
    let sandbox = Sandbox::new();
    sandbox.set_retention(1, 0, 0);

    for run in 0..3 {
        if run > 0 {
            std::thread::sleep(std::time::Duration::from_millis(1100));
        }
        let output = sandbox.bak(&["backup"]).output().unwrap();
        assert!(
            output.status.success(),
            "run {run} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let names = sandbox.snapshot_names();
    assert_eq!(names.len(), 1, "retention left {names:?}");

    // The survivor is the newest: it holds the latest content and verifies
    let verify = sandbox.bak(&["verify"]).output().unwrap();
    assert!(
        verify.status.success(),
        "verify failed: {}",
        String::from_utf8_lossy(&verify.stderr)
    );
}

#[test]
fn list_and_search_surface_the_snapshot() {
    let sandbox = Sandbox::new();
    assert!(sandbox.bak(&["backup"]).status().unwrap().success());
    let names = sandbox.snapshot_names();

    let list = sandbox.bak(&["list"]).output().unwrap();
    assert!(list.status.success());
    assert!(String::from_utf8_lossy(&list.stdout).contains(&names[0]));

    let search = sandbox.bak(&["search", "*.txt"]).output().unwrap();
    assert!(search.status.success());
    assert!(String::from_utf8_lossy(&search.stdout).contains("proj/a.txt"));
}

#[test]
fn diff_reports_live_changes() {
    let sandbox = Sandbox::new();
    assert!(sandbox.bak(&["backup"]).status().unwrap().success());

    std::fs::write(sandbox.source.join("new.txt"), "new").unwrap();
    let diff = sandbox.bak(&["diff"]).output().unwrap();
    assert!(diff.status.success());
    assert!(String::from_utf8_lossy(&diff.stdout).contains("A proj/new.txt"));
}

#[test]
fn missing_config_exits_with_code_one() {
    let sandbox = Sandbox::new();
    std::fs::remove_file(&sandbox.config_path).unwrap();

    let output = sandbox.bak(&["backup"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(sandbox.snapshot_names().is_empty());
}
