// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for daemon communication.
//!
//! Wire format: one JSON envelope per line, UTF-8, `\n`-terminated.
//! The envelope carries a `type` tag, a payload object, an ISO-8601
//! timestamp, and an optional `message_id` echoed into responses.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,

    #[error("Unknown message type: {0}")]
    UnknownType(String),
}

/// Maximum line length (1 MB)
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Default IPC read/write timeout
pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Wire envelope shared by requests and responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Map<String, Value>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
}

impl Envelope {
    /// Build an envelope with a serializable payload and a fresh
    /// timestamp.
    pub fn new<P: Serialize>(kind: &str, payload: &P, message_id: Option<String>) -> Self {
        let payload = match serde_json::to_value(payload) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self {
            kind: kind.to_string(),
            payload,
            timestamp: chrono::Local::now().to_rfc3339(),
            message_id,
        }
    }

    /// Fresh request envelope with an empty payload and a generated id.
    pub fn request(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            payload: Map::new(),
            timestamp: chrono::Local::now().to_rfc3339(),
            message_id: Some(uuid::Uuid::new_v4().to_string()),
        }
    }

    /// Decode the payload object into a typed structure.
    pub fn payload_as<P: for<'de> Deserialize<'de>>(&self) -> Result<P, ProtocolError> {
        Ok(serde_json::from_value(Value::Object(self.payload.clone()))?)
    }
}

/// Requests the daemon understands, one per wire `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Status,
    Trigger,
    Browse,
}

impl Request {
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ProtocolError> {
        match envelope.kind.as_str() {
            "status_request" => Ok(Request::Status),
            "backup_trigger" => Ok(Request::Trigger),
            "browse_request" => Ok(Request::Browse),
            other => Err(ProtocolError::UnknownType(other.to_string())),
        }
    }

    pub fn wire_type(&self) -> &'static str {
        match self {
            Request::Status => "status_request",
            Request::Trigger => "backup_trigger",
            Request::Browse => "browse_request",
        }
    }
}

/// Backup status for display surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupStatus {
    Protected,
    BackingUp,
    Warning,
    Error,
}

/// Payload of `status_response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub status: BackupStatus,
    pub last_backup: Option<String>,
    pub next_backup: Option<String>,
    pub total_snapshots: usize,
    pub message: String,
    pub is_running: bool,
    pub destination_available: bool,
}

/// Payload of `backup_response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerPayload {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_transferred: Option<u64>,
}

/// Payload of `browse_response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowsePayload {
    pub success: bool,
    pub path: Option<String>,
    pub message: String,
}

/// Payload of `error_response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: String,
    pub message: String,
}

pub fn status_response(payload: &StatusPayload, reply_to: Option<String>) -> Envelope {
    Envelope::new("status_response", payload, reply_to)
}

pub fn backup_response(payload: &TriggerPayload, reply_to: Option<String>) -> Envelope {
    Envelope::new("backup_response", payload, reply_to)
}

pub fn browse_response(payload: &BrowsePayload, reply_to: Option<String>) -> Envelope {
    Envelope::new("browse_response", payload, reply_to)
}

pub fn error_response(error: &str, message: &str, reply_to: Option<String>) -> Envelope {
    Envelope::new(
        "error_response",
        &ErrorPayload {
            error: error.to_string(),
            message: message.to_string(),
        },
        reply_to,
    )
}

/// Encode an envelope as a single JSON line (without the terminator).
pub fn encode(envelope: &Envelope) -> Result<String, ProtocolError> {
    let line = serde_json::to_string(envelope)?;
    if line.len() > MAX_LINE_BYTES {
        return Err(ProtocolError::MessageTooLarge {
            size: line.len(),
            max: MAX_LINE_BYTES,
        });
    }
    Ok(line)
}

/// Decode one line into an envelope.
pub fn decode(line: &str) -> Result<Envelope, ProtocolError> {
    Ok(serde_json::from_str(line.trim_end())?)
}

/// Read one `\n`-terminated line with a timeout. `Ok(None)` is a clean
/// peer close.
pub async fn read_line<R: AsyncBufReadExt + Unpin>(
    reader: &mut R,
    timeout: std::time::Duration,
) -> Result<Option<String>, ProtocolError> {
    let mut line = String::new();
    let n = tokio::time::timeout(timeout, reader.read_line(&mut line))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    if n == 0 {
        return Ok(None);
    }
    if line.len() > MAX_LINE_BYTES {
        return Err(ProtocolError::MessageTooLarge {
            size: line.len(),
            max: MAX_LINE_BYTES,
        });
    }
    Ok(Some(line))
}

/// Write one envelope as a line with a timeout.
pub async fn write_envelope<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    envelope: &Envelope,
    timeout: std::time::Duration,
) -> Result<(), ProtocolError> {
    let mut line = encode(envelope)?;
    line.push('\n');
    tokio::time::timeout(timeout, async {
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await
    })
    .await
    .map_err(|_| ProtocolError::Timeout)??;
    Ok(())
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
