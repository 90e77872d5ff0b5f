// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The listener accepts connections and spawns a task per client; each
//! connection handles request/response pairs until the peer closes or a
//! read times out. The backup trigger runs on the blocking pool so the
//! accept loop stays responsive.

use std::path::PathBuf;
use std::sync::Arc;

use bak_core::{Config, SystemClock};
use bak_engine::{run_backup_with_cleanup, CleanupHandle, RunOptions, SnapshotStore};
use tokio::io::BufReader;
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::protocol::{
    self, BrowsePayload, Envelope, ProtocolError, Request, TriggerPayload, DEFAULT_TIMEOUT,
};
use crate::status;

/// Shared daemon context for all request handlers.
pub struct ListenCtx {
    /// Configuration file consulted fresh on every request
    pub config_path: PathBuf,
    /// Lock file protecting the backup destination
    pub lock_path: PathBuf,
    /// Cleanup state of the in-flight backup run, shared with shutdown
    pub cleanup: CleanupHandle,
}

/// Listener task for accepting socket connections.
pub struct Listener {
    socket: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(socket: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { socket, ctx }
    }

    /// Accept loop; runs until the task is dropped at shutdown.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        match handle_connection(stream, &ctx).await {
                            Ok(()) | Err(ProtocolError::ConnectionClosed) => {
                                debug!("client disconnected")
                            }
                            Err(ProtocolError::Timeout) => debug!("connection idle, closing"),
                            Err(e) => warn!(error = %e, "connection error"),
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "accept error");
                }
            }
        }
    }
}

/// Handle request/response pairs on one connection until the peer
/// closes. Malformed JSON gets an error response and the connection
/// continues.
async fn handle_connection(
    stream: UnixStream,
    ctx: &ListenCtx,
) -> Result<(), ProtocolError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    loop {
        let Some(line) = protocol::read_line(&mut reader, DEFAULT_TIMEOUT).await? else {
            return Ok(());
        };
        if line.trim().is_empty() {
            continue;
        }

        let response = match protocol::decode(&line) {
            Ok(envelope) => {
                debug!(kind = %envelope.kind, "received request");
                handle_envelope(&envelope, ctx).await
            }
            Err(e) => {
                warn!(error = %e, "malformed request");
                protocol::error_response("INVALID_MESSAGE", &e.to_string(), None)
            }
        };

        protocol::write_envelope(&mut writer, &response, DEFAULT_TIMEOUT).await?;
    }
}

/// Exhaustive dispatch over the request variants.
async fn handle_envelope(envelope: &Envelope, ctx: &ListenCtx) -> Envelope {
    let reply_to = envelope.message_id.clone();
    match Request::from_envelope(envelope) {
        Ok(Request::Status) => {
            let payload = match Config::load(&ctx.config_path) {
                Ok(config) => status::derive_status(&config, &ctx.lock_path, &SystemClock),
                Err(bak_core::ConfigError::Missing(_)) => status::unconfigured(),
                Err(e) => {
                    error!(error = %e, "status derivation failed");
                    status::internal_error("could not read backup status")
                }
            };
            protocol::status_response(&payload, reply_to)
        }
        Ok(Request::Trigger) => {
            let payload = handle_trigger(ctx).await;
            protocol::backup_response(&payload, reply_to)
        }
        Ok(Request::Browse) => {
            let payload = handle_browse(ctx);
            protocol::browse_response(&payload, reply_to)
        }
        Err(ProtocolError::UnknownType(kind)) => protocol::error_response(
            "UNKNOWN_MESSAGE_TYPE",
            &format!("unknown message type: {kind}"),
            reply_to,
        ),
        Err(e) => protocol::error_response("INVALID_MESSAGE", &e.to_string(), reply_to),
    }
}

/// Run a backup on the blocking pool and report the outcome.
async fn handle_trigger(ctx: &ListenCtx) -> TriggerPayload {
    let config = match Config::load(&ctx.config_path) {
        Ok(config) => config,
        Err(e) => {
            return TriggerPayload {
                success: false,
                message: format!("backups not configured: {e}"),
                snapshot: None,
                files_transferred: None,
            }
        }
    };

    let options = RunOptions::new(&ctx.lock_path);
    let cleanup = ctx.cleanup.clone();
    let result = tokio::task::spawn_blocking(move || {
        run_backup_with_cleanup(&config, &options, &bak_engine::LogNotifier, cleanup)
    })
    .await;

    match result {
        Ok(Ok(outcome)) => {
            info!(snapshot = %outcome.name, "triggered backup complete");
            TriggerPayload {
                success: true,
                message: "backup complete".to_string(),
                snapshot: Some(outcome.name.to_string()),
                files_transferred: Some(outcome.files_transferred),
            }
        }
        Ok(Err(e)) => {
            warn!(error = %e, "triggered backup failed");
            TriggerPayload {
                success: false,
                message: format!("backup failed: {e}"),
                snapshot: None,
                files_transferred: None,
            }
        }
        Err(e) => {
            error!(error = %e, "backup task panicked");
            TriggerPayload {
                success: false,
                message: "backup failed unexpectedly".to_string(),
                snapshot: None,
                files_transferred: None,
            }
        }
    }
}

/// Report the path clients should open to browse backups.
fn handle_browse(ctx: &ListenCtx) -> BrowsePayload {
    let config = match Config::load(&ctx.config_path) {
        Ok(config) => config,
        Err(e) => {
            return BrowsePayload {
                success: false,
                path: None,
                message: format!("backups not configured: {e}"),
            }
        }
    };

    let destination = config.backup_destination;
    if !destination.is_dir() {
        return BrowsePayload {
            success: false,
            path: Some(destination.display().to_string()),
            message: "backup destination not available".to_string(),
        };
    }

    let snapshots = SnapshotStore::new(&destination).list_snapshots().len();
    BrowsePayload {
        success: true,
        path: Some(destination.display().to_string()),
        message: format!("{snapshots} snapshots available"),
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
