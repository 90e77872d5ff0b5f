//! Signal-cleanup specs: SIGTERM mid-run leaves no staging, no lock,
//! and exits 128+signo.

use crate::prelude::*;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::time::Duration;

/// Source tree big enough that the copy phase is comfortably observable.
fn grow_source(sandbox: &Sandbox) {
    for d in 0..40 {
        let dir = sandbox.source.join(format!("mod_{d:02}"));
        std::fs::create_dir_all(&dir).unwrap();
        for f in 0..100 {
            std::fs::write(dir.join(format!("file_{f:03}.dat")), [b'x'; 2048]).unwrap();
        }
    }
}

#[test]
fn sigterm_mid_run_cleans_up_and_exits_143() {
    let sandbox = Sandbox::new();
    grow_source(&sandbox);

    let mut child = sandbox.bak(&["backup"]).spawn().unwrap();

    // Wait for the staging directory so the signal lands mid-copy
    let appeared = wait_until(Duration::from_secs(10), || {
        !sandbox.staging_names().is_empty()
    });
    assert!(appeared, "staging directory never appeared");

    kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM).unwrap();
    let status = child.wait().unwrap();

    assert_eq!(status.code(), Some(143), "exit status was {status:?}");
    assert!(
        sandbox.staging_names().is_empty(),
        "staging left behind: {:?}",
        sandbox.staging_names()
    );
    assert!(!sandbox.lock_path().exists(), "lock file left behind");
    assert!(sandbox.snapshot_names().is_empty(), "no commit expected");
}

#[test]
fn sigint_mid_run_exits_130() {
    let sandbox = Sandbox::new();
    grow_source(&sandbox);

    let mut child = sandbox.bak(&["backup"]).spawn().unwrap();
    let appeared = wait_until(Duration::from_secs(10), || {
        !sandbox.staging_names().is_empty()
    });
    assert!(appeared, "staging directory never appeared");

    kill(Pid::from_raw(child.id() as i32), Signal::SIGINT).unwrap();
    let status = child.wait().unwrap();

    assert_eq!(status.code(), Some(130), "exit status was {status:?}");
    assert!(sandbox.staging_names().is_empty());
    assert!(!sandbox.lock_path().exists());
}

#[test]
fn next_run_sweeps_staging_left_by_a_crash() {
    let sandbox = Sandbox::new();
    std::fs::create_dir_all(&sandbox.destination).unwrap();
    let stale = sandbox.destination.join("in_progress_2020-01-01-000000");
    std::fs::create_dir_all(&stale).unwrap();
    std::fs::write(stale.join("partial"), "x").unwrap();

    let output = sandbox.bak(&["backup"]).output().unwrap();
    assert!(output.status.success());
    assert!(!stale.exists());
    assert_eq!(sandbox.snapshot_names().len(), 1);
}
