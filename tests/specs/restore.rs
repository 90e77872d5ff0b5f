//! Restore safety specs.

use crate::prelude::*;

#[test]
fn path_traversal_is_rejected_and_writes_nothing() {
    let sandbox = Sandbox::new();
    assert!(sandbox.bak(&["backup"]).status().unwrap().success());
    let snapshot = sandbox.snapshot_names()[0].clone();

    let output = sandbox
        .bak(&["restore", &snapshot, "../../etc/passwd"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).to_lowercase().contains("path"));
    // Nothing recovered, nowhere
    assert!(!sandbox.dir.path().join("Desktop").exists());
}

#[test]
fn restore_to_default_location_never_overwrites() {
    let sandbox = Sandbox::new();
    assert!(sandbox.bak(&["backup"]).status().unwrap().success());
    let snapshot = sandbox.snapshot_names()[0].clone();

    assert!(sandbox
        .bak(&["restore", &snapshot, "proj/a.txt"])
        .status()
        .unwrap()
        .success());
    assert!(sandbox
        .bak(&["restore", &snapshot, "proj/a.txt"])
        .status()
        .unwrap()
        .success());

    let recovered = sandbox.dir.path().join("Desktop/Recovered Files");
    assert_eq!(
        std::fs::read(recovered.join("a.txt")).unwrap(),
        b"hello"
    );
    assert_eq!(
        std::fs::read(recovered.join("a_1.txt")).unwrap(),
        b"hello"
    );
}

#[test]
fn restore_does_not_touch_the_live_source() {
    let sandbox = Sandbox::new();
    assert!(sandbox.bak(&["backup"]).status().unwrap().success());
    let snapshot = sandbox.snapshot_names()[0].clone();

    std::fs::write(sandbox.source.join("a.txt"), "mutated").unwrap();
    assert!(sandbox
        .bak(&["restore", &snapshot, "proj/a.txt"])
        .status()
        .unwrap()
        .success());

    assert_eq!(
        std::fs::read(sandbox.source.join("a.txt")).unwrap(),
        b"mutated"
    );
}

#[test]
fn restore_to_explicit_destination() {
    let sandbox = Sandbox::new();
    assert!(sandbox.bak(&["backup"]).status().unwrap().success());
    let snapshot = sandbox.snapshot_names()[0].clone();
    let target = sandbox.dir.path().join("out/alpha.txt");

    assert!(sandbox
        .bak(&[
            "restore",
            &snapshot,
            "proj/a.txt",
            "--to",
            target.to_str().unwrap()
        ])
        .status()
        .unwrap()
        .success());
    assert_eq!(std::fs::read(&target).unwrap(), b"hello");
}
