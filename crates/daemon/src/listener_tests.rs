// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::protocol::{BackupStatus, StatusPayload};
use std::fs;
use tempfile::tempdir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

struct TestDaemon {
    _dir: tempfile::TempDir,
    socket_path: PathBuf,
    config_path: PathBuf,
}

async fn spawn_daemon(write_config: bool) -> TestDaemon {
    let dir = tempdir().unwrap();
    let socket_path = dir.path().join("ipc.sock");
    let config_path = dir.path().join("config.toml");

    if write_config {
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.txt"), "hello").unwrap();
        fs::write(
            &config_path,
            format!(
                "backup_destination = {:?}\nsource_directories = [{:?}]\n",
                dir.path().join("dest"),
                src
            ),
        )
        .unwrap();
    }

    let ctx = Arc::new(ListenCtx {
        config_path: config_path.clone(),
        lock_path: dir.path().join("backup.lock"),
        cleanup: CleanupHandle::new(),
    });
    let socket = UnixListener::bind(&socket_path).unwrap();
    tokio::spawn(Listener::new(socket, ctx).run());

    TestDaemon {
        _dir: dir,
        socket_path,
        config_path,
    }
}

async fn roundtrip(socket_path: &std::path::Path, line: &str) -> Envelope {
    let stream = UnixStream::connect(socket_path).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    writer.write_all(line.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    let mut response = String::new();
    reader.read_line(&mut response).await.unwrap();
    protocol::decode(&response).unwrap()
}

#[tokio::test]
async fn status_request_without_config_warns() {
    let daemon = spawn_daemon(false).await;
    let request = protocol::encode(&Envelope::request("status_request")).unwrap();

    let response = roundtrip(&daemon.socket_path, &request).await;
    assert_eq!(response.kind, "status_response");
    let payload: StatusPayload = response.payload_as().unwrap();
    assert_eq!(payload.status, BackupStatus::Warning);
    assert!(!payload.destination_available);
}

#[tokio::test]
async fn status_echoes_message_id() {
    let daemon = spawn_daemon(false).await;
    let mut envelope = Envelope::request("status_request");
    envelope.message_id = Some("correlate-77".to_string());

    let response = roundtrip(
        &daemon.socket_path,
        &protocol::encode(&envelope).unwrap(),
    )
    .await;
    assert_eq!(response.message_id.as_deref(), Some("correlate-77"));
}

#[tokio::test]
async fn unknown_type_yields_error_response_and_connection_survives() {
    let daemon = spawn_daemon(false).await;

    let stream = UnixStream::connect(&daemon.socket_path).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    // Unknown type first
    let bad = protocol::encode(&Envelope::request("teleport_request")).unwrap();
    writer.write_all(bad.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    let mut response = String::new();
    reader.read_line(&mut response).await.unwrap();
    let envelope = protocol::decode(&response).unwrap();
    assert_eq!(envelope.kind, "error_response");
    assert_eq!(
        envelope.payload.get("error").and_then(|v| v.as_str()),
        Some("UNKNOWN_MESSAGE_TYPE")
    );

    // Same connection still serves valid requests
    let good = protocol::encode(&Envelope::request("status_request")).unwrap();
    writer.write_all(good.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    let mut response = String::new();
    reader.read_line(&mut response).await.unwrap();
    assert_eq!(
        protocol::decode(&response).unwrap().kind,
        "status_response"
    );
}

#[tokio::test]
async fn malformed_json_yields_invalid_message_and_connection_survives() {
    let daemon = spawn_daemon(false).await;

    let stream = UnixStream::connect(&daemon.socket_path).await.unwrap();
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    writer.write_all(b"{oops\n").await.unwrap();
    let mut response = String::new();
    reader.read_line(&mut response).await.unwrap();
    let envelope = protocol::decode(&response).unwrap();
    assert_eq!(envelope.kind, "error_response");
    assert_eq!(
        envelope.payload.get("error").and_then(|v| v.as_str()),
        Some("INVALID_MESSAGE")
    );

    let good = protocol::encode(&Envelope::request("status_request")).unwrap();
    writer.write_all(good.as_bytes()).await.unwrap();
    writer.write_all(b"\n").await.unwrap();
    let mut response = String::new();
    reader.read_line(&mut response).await.unwrap();
    assert_eq!(
        protocol::decode(&response).unwrap().kind,
        "status_response"
    );
}

#[tokio::test]
async fn browse_reports_destination_path() {
    let daemon = spawn_daemon(true).await;
    // Destination exists after the first trigger; create it up front
    let config = Config::load(&daemon.config_path).unwrap();
    fs::create_dir_all(&config.backup_destination).unwrap();

    let request = protocol::encode(&Envelope::request("browse_request")).unwrap();
    let response = roundtrip(&daemon.socket_path, &request).await;
    assert_eq!(response.kind, "browse_response");
    let payload: BrowsePayload = response.payload_as().unwrap();
    assert!(payload.success);
    assert_eq!(
        payload.path.as_deref(),
        Some(config.backup_destination.to_str().unwrap())
    );
}

#[tokio::test]
async fn trigger_runs_a_backup_end_to_end() {
    let daemon = spawn_daemon(true).await;

    let request = protocol::encode(&Envelope::request("backup_trigger")).unwrap();
    let response = roundtrip(&daemon.socket_path, &request).await;
    assert_eq!(response.kind, "backup_response");
    let payload: TriggerPayload = response.payload_as().unwrap();
    assert!(payload.success, "trigger failed: {}", payload.message);
    assert_eq!(payload.files_transferred, Some(1));

    let config = Config::load(&daemon.config_path).unwrap();
    let snapshots = SnapshotStore::new(&config.backup_destination).list_snapshots();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(
        payload.snapshot.as_deref(),
        Some(snapshots[0].name.to_string().as_str())
    );
}

#[tokio::test]
async fn concurrent_clients_are_served() {
    let daemon = spawn_daemon(false).await;
    let request = protocol::encode(&Envelope::request("status_request")).unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let socket_path = daemon.socket_path.clone();
        let request = request.clone();
        handles.push(tokio::spawn(async move {
            roundtrip(&socket_path, &request).await
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().kind, "status_response");
    }
}
