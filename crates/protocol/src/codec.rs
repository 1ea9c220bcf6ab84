//! Message Codec
//!
//! Design decisions:
//! 1. Requests are written field-by-field so the wire order is always
//!    `seq, type, command, arguments`
//! 2. `arguments` is omitted, never `null`, when a command takes none
//! 3. Decoding goes through `Value` first so every failure has a precise kind

use serde::Serialize;
use serde_json::Value;

use crate::error::{DecodeError, Result};
use crate::types::{Handle, Packet, PacketKind, Response, SequenceNumber};

#[derive(Serialize)]
struct WireRequest<'a> {
    seq: SequenceNumber,
    #[serde(rename = "type")]
    kind: &'static str,
    command: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<&'a Value>,
}

/// Encode a request packet
pub fn encode(
    command: &str,
    seq: SequenceNumber,
    arguments: Option<&Value>,
) -> Result<String> {
    let wire = WireRequest {
        seq,
        kind: PacketKind::Request.as_str(),
        command,
        arguments,
    };
    Ok(serde_json::to_string(&wire)?)
}

/// Encode any packet, tag included
pub fn encode_packet(packet: &Packet) -> Result<String> {
    match packet {
        Packet::Request(request) => {
            encode(&request.command, request.seq, request.arguments.as_ref())
        }
        other => Ok(serde_json::to_string(other)?),
    }
}

/// Decode one raw message
pub fn decode(raw: &str) -> std::result::Result<Packet, DecodeError> {
    let value: Value = serde_json::from_str(raw).map_err(DecodeError::InvalidJson)?;
    let kind = {
        let object = value.as_object().ok_or(DecodeError::NotAnObject)?;
        let tag = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingType)?;
        PacketKind::parse(tag).ok_or_else(|| DecodeError::UnknownType(tag.to_string()))?
    };

    let malformed = |source| DecodeError::Malformed {
        kind: kind.as_str(),
        source,
    };

    // The struct deserializers ignore the extra `type` key.
    match kind {
        PacketKind::Request => serde_json::from_value(value)
            .map(Packet::Request)
            .map_err(malformed),
        PacketKind::Response => serde_json::from_value(value)
            .map(Packet::Response)
            .map_err(malformed),
        PacketKind::Event => serde_json::from_value(value)
            .map(Packet::Event)
            .map_err(malformed),
    }
}

/// Look up `handle` in the response's own refs
pub fn resolve_handle(response: &Response, handle: Handle) -> Option<&Value> {
    response
        .refs
        .iter()
        .find(|r| r.get("handle").and_then(Value::as_i64) == Some(handle))
}
