//! Error types for the packet layer
//!
//! Flat and small. Decode failures are values the caller reports, not panics.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("packet is not a JSON object")]
    NotAnObject,

    #[error("packet has no string `type` field")]
    MissingType,

    #[error("unknown packet type: {0}")]
    UnknownType(String),

    #[error("malformed {kind} packet: {source}")]
    Malformed {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}
