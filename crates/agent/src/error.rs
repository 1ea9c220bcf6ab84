//! Agent error types
//!
//! Only local faults live here. A command the backend rejects is not an
//! error: it comes back as a [`RemoteFailure`](crate::sequencer::RemoteFailure).

use std::time::Duration;

use debugger_protocol::{ProtocolError, SequenceNumber};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Command '{command}' (seq {seq}) timed out after {elapsed:?}")]
    Timeout {
        seq: SequenceNumber,
        command: String,
        elapsed: Duration,
    },

    #[error("Connection closed")]
    Closed,

    #[error("Unexpected body for '{command}': {reason}")]
    UnexpectedBody { command: String, reason: String },
}

/// Result type for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
