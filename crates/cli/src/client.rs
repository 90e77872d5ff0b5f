// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands.
//!
//! One connection per request: connect, send a line, read a line. All
//! steps are bounded by the IPC timeout.

use bak_daemon::lifecycle::DaemonConfig;
use bak_daemon::protocol::{
    self, BrowsePayload, Envelope, ProtocolError, Request, StatusPayload, TriggerPayload,
    DEFAULT_TIMEOUT,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::UnixStream;

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running (socket: {0})")]
    DaemonNotRunning(PathBuf),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("daemon error: {0}")]
    Daemon(String),

    #[error("unexpected response type: {0}")]
    UnexpectedResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct DaemonClient {
    socket_path: PathBuf,
    timeout: Duration,
}

impl DaemonClient {
    /// Client against the daemon's resolved socket path.
    pub fn from_env() -> Result<Self, ClientError> {
        let config = DaemonConfig::load()
            .map_err(|e| ClientError::Io(std::io::Error::other(e.to_string())))?;
        Ok(Self::new(config.socket_path))
    }

    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Whether something is listening on the socket.
    pub fn is_daemon_running(&self) -> bool {
        self.block_on(async {
            tokio::time::timeout(
                Duration::from_millis(500),
                UnixStream::connect(&self.socket_path),
            )
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
        })
    }

    pub fn request_status(&self) -> Result<StatusPayload, ClientError> {
        let response = self.request(Envelope::request(Request::Status.wire_type()))?;
        expect_kind(&response, "status_response")?;
        Ok(response.payload_as()?)
    }

    pub fn trigger_backup(&self) -> Result<TriggerPayload, ClientError> {
        let response = self.request(Envelope::request(Request::Trigger.wire_type()))?;
        expect_kind(&response, "backup_response")?;
        Ok(response.payload_as()?)
    }

    pub fn request_browse(&self) -> Result<BrowsePayload, ClientError> {
        let response = self.request(Envelope::request(Request::Browse.wire_type()))?;
        expect_kind(&response, "browse_response")?;
        Ok(response.payload_as()?)
    }

    /// Send one envelope and wait for its response.
    pub fn request(&self, envelope: Envelope) -> Result<Envelope, ClientError> {
        let socket_path = self.socket_path.clone();
        let timeout = self.timeout;
        self.block_on(async move {
            let stream = tokio::time::timeout(timeout, UnixStream::connect(&socket_path))
                .await
                .map_err(|_| ProtocolError::Timeout)?
                .map_err(|_| ClientError::DaemonNotRunning(socket_path.clone()))?;

            let (reader, mut writer) = stream.into_split();
            let mut reader = BufReader::new(reader);

            protocol::write_envelope(&mut writer, &envelope, timeout).await?;
            let line = protocol::read_line(&mut reader, timeout)
                .await?
                .ok_or(ProtocolError::ConnectionClosed)?;
            Ok(protocol::decode(&line)?)
        })
    }

    fn block_on<T>(&self, fut: impl std::future::Future<Output = T>) -> T {
        match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime.block_on(fut),
            Err(e) => {
                // Runtime construction only fails on resource exhaustion
                eprintln!("error: failed to start IO runtime: {e}");
                std::process::exit(1);
            }
        }
    }
}

fn expect_kind(envelope: &Envelope, expected: &str) -> Result<(), ClientError> {
    if envelope.kind == expected {
        return Ok(());
    }
    if envelope.kind == "error_response" {
        let message = envelope
            .payload
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error");
        return Err(ClientError::Daemon(message.to_string()));
    }
    Err(ClientError::UnexpectedResponse(envelope.kind.clone()))
}
