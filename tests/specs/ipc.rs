//! Daemon IPC specs over the real Unix socket.

use crate::prelude::*;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::io::{BufRead, BufReader, Write};
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixStream;
use std::process::Stdio;
use std::time::Duration;

struct RunningDaemon {
    child: std::process::Child,
}

impl RunningDaemon {
    fn start(sandbox: &Sandbox) -> Self {
        let mut child = sandbox
            .bakd()
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        let stdout = child.stdout.take().unwrap();
        let mut reader = BufReader::new(stdout);
        let mut line = String::new();
        loop {
            line.clear();
            let n = reader.read_line(&mut line).unwrap();
            assert!(n > 0, "daemon exited before READY");
            if line.trim() == "READY" {
                break;
            }
        }
        Self { child }
    }

    fn pid(&self) -> Pid {
        Pid::from_raw(self.child.id() as i32)
    }
}

impl Drop for RunningDaemon {
    fn drop(&mut self) {
        let _ = kill(self.pid(), Signal::SIGTERM);
        let _ = self.child.wait();
    }
}

fn request(sandbox: &Sandbox, line: &str) -> serde_json::Value {
    let mut stream = UnixStream::connect(sandbox.socket_path()).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(30)))
        .unwrap();
    stream.write_all(line.as_bytes()).unwrap();
    stream.write_all(b"\n").unwrap();

    let mut reader = BufReader::new(stream);
    let mut response = String::new();
    reader.read_line(&mut response).unwrap();
    serde_json::from_str(&response).unwrap()
}

#[test]
fn status_request_round_trips() {
    let sandbox = Sandbox::new();
    let _daemon = RunningDaemon::start(&sandbox);

    let response = request(
        &sandbox,
        r#"{"type":"status_request","payload":{},"timestamp":"2026-08-01T00:00:00Z","message_id":"m-1"}"#,
    );
    assert_eq!(response["type"], "status_response");
    assert_eq!(response["message_id"], "m-1");
    // No snapshots yet: warning state, destination not created
    assert_eq!(response["payload"]["status"], "warning");
    assert_eq!(response["payload"]["total_snapshots"], 0);
    assert_eq!(response["payload"]["is_running"], false);
}

#[test]
fn backup_trigger_creates_a_snapshot() {
    let sandbox = Sandbox::new();
    let _daemon = RunningDaemon::start(&sandbox);

    let response = request(
        &sandbox,
        r#"{"type":"backup_trigger","payload":{},"timestamp":"2026-08-01T00:00:00Z"}"#,
    );
    assert_eq!(response["type"], "backup_response");
    assert_eq!(response["payload"]["success"], true, "{response}");
    assert_eq!(response["payload"]["files_transferred"], 1);
    assert_eq!(sandbox.snapshot_names().len(), 1);

    // Status flips to protected after the backup
    let status = request(
        &sandbox,
        r#"{"type":"status_request","payload":{},"timestamp":"2026-08-01T00:00:00Z"}"#,
    );
    assert_eq!(status["payload"]["status"], "protected");
    assert_eq!(status["payload"]["total_snapshots"], 1);
}

#[test]
fn browse_reports_the_destination() {
    let sandbox = Sandbox::new();
    std::fs::create_dir_all(&sandbox.destination).unwrap();
    let _daemon = RunningDaemon::start(&sandbox);

    let response = request(
        &sandbox,
        r#"{"type":"browse_request","payload":{},"timestamp":"2026-08-01T00:00:00Z"}"#,
    );
    assert_eq!(response["type"], "browse_response");
    assert_eq!(response["payload"]["success"], true);
    assert_eq!(
        response["payload"]["path"],
        sandbox.destination.to_str().unwrap()
    );
}

#[test]
fn unknown_and_malformed_messages_get_error_responses() {
    let sandbox = Sandbox::new();
    let _daemon = RunningDaemon::start(&sandbox);

    let mut stream = UnixStream::connect(sandbox.socket_path()).unwrap();
    stream
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    stream
        .write_all(b"{\"type\":\"dance_request\",\"payload\":{},\"timestamp\":\"t\"}\n")
        .unwrap();
    let mut reader = BufReader::new(&stream);
    let mut line = String::new();
    reader.read_line(&mut line).unwrap();
    let response: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response["type"], "error_response");
    assert_eq!(response["payload"]["error"], "UNKNOWN_MESSAGE_TYPE");

    // Malformed JSON on the same connection still gets a response
    (&stream).write_all(b"this is not json\n").unwrap();
    line.clear();
    reader.read_line(&mut line).unwrap();
    let response: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(response["type"], "error_response");
    assert_eq!(response["payload"]["error"], "INVALID_MESSAGE");
}

#[test]
fn socket_is_user_private() {
    let sandbox = Sandbox::new();
    let _daemon = RunningDaemon::start(&sandbox);

    let dir_mode = std::fs::metadata(&sandbox.state_dir)
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(dir_mode & 0o777, 0o700);

    let sock_mode = std::fs::metadata(sandbox.socket_path())
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(sock_mode & 0o777, 0o600);
}

#[test]
fn sigterm_stops_the_daemon_and_removes_the_socket() {
    let sandbox = Sandbox::new();
    let mut daemon = RunningDaemon::start(&sandbox);

    kill(daemon.pid(), Signal::SIGTERM).unwrap();
    let status = daemon.child.wait().unwrap();
    assert_eq!(status.code(), Some(143));
    assert!(!sandbox.socket_path().exists());

    // A fresh daemon can bind again immediately
    let _second = RunningDaemon::start(&sandbox);
    assert!(sandbox.socket_path().exists());
}

#[test]
fn daemon_start_status_stop_cycle() {
    let sandbox = Sandbox::new();

    let start = sandbox.bak(&["daemon", "start"]).output().unwrap();
    assert!(
        start.status.success(),
        "start failed: {}",
        String::from_utf8_lossy(&start.stderr)
    );

    let status = sandbox.bak(&["daemon", "status"]).output().unwrap();
    assert!(String::from_utf8_lossy(&status.stdout).contains("running"));

    let stop = sandbox.bak(&["daemon", "stop"]).output().unwrap();
    assert!(
        stop.status.success(),
        "stop failed: {}",
        String::from_utf8_lossy(&stop.stderr)
    );
    assert!(wait_until(Duration::from_secs(2), || {
        !sandbox.socket_path().exists()
    }));

    let status = sandbox.bak(&["daemon", "status"]).output().unwrap();
    assert!(String::from_utf8_lossy(&status.stdout).contains("not running"));
}

#[test]
fn stale_socket_from_a_killed_daemon_is_recovered() {
    let sandbox = Sandbox::new();
    {
        let daemon = RunningDaemon::start(&sandbox);
        // SIGKILL: no cleanup happens, socket file remains
        kill(daemon.pid(), Signal::SIGKILL).unwrap();
    }
    assert!(
        wait_until(Duration::from_secs(2), || sandbox.socket_path().exists()),
        "socket should remain after SIGKILL"
    );

    // The next daemon probes, unlinks the orphan, and binds
    let _daemon = RunningDaemon::start(&sandbox);
    let response = request(
        &sandbox,
        r#"{"type":"status_request","payload":{},"timestamp":"t"}"#,
    );
    assert_eq!(response["type"], "status_response");
}
