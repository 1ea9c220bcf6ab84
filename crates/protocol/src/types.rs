//! Packet Types
//!
//! The three packet shapes that travel over the channel, plus the few body
//! shapes the agent actually interprets. Everything else stays `Value`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::handles::HandleTable;

/// Sequence number - monotonically increasing per connection
pub type SequenceNumber = u64;

/// Object handle inside a packet's `refs` array
pub type Handle = i64;

/// Script id assigned by the backend
pub type ScriptId = u64;

/// Value of the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacketKind {
    Request,
    Response,
    Event,
}

impl PacketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacketKind::Request => "request",
            PacketKind::Response => "response",
            PacketKind::Event => "event",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "request" => Some(PacketKind::Request),
            "response" => Some(PacketKind::Response),
            "event" => Some(PacketKind::Event),
            _ => None,
        }
    }
}

/// Request sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub seq: SequenceNumber,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
}

/// Response to a request, correlated through `request_seq`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub seq: SequenceNumber,
    pub request_seq: SequenceNumber,
    #[serde(default)]
    pub command: String,
    pub success: bool,
    /// Whether the remote context is running after the request
    #[serde(default)]
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<Value>,
    /// Remote error text when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    /// Handle table over this response's own refs
    pub fn handles(&self) -> HandleTable<'_> {
        HandleTable::from_refs(&self.refs)
    }

    /// Remote error message, falling back to a generic text
    pub fn failure_message(&self) -> String {
        self.message
            .clone()
            .unwrap_or_else(|| format!("command '{}' failed", self.command))
    }
}

/// Unsolicited packet from the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub seq: SequenceNumber,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<Value>,
}

impl Event {
    pub fn handles(&self) -> HandleTable<'_> {
        HandleTable::from_refs(&self.refs)
    }

    /// Deserialize the body into `T`, treating a missing body as `{}`
    pub fn body_as<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        let body = self
            .body
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()));
        serde_json::from_value(body)
    }
}

/// A decoded packet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Packet {
    Request(Request),
    Response(Response),
    Event(Event),
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Request(_) => PacketKind::Request,
            Packet::Response(_) => PacketKind::Response,
            Packet::Event(_) => PacketKind::Event,
        }
    }

    pub fn seq(&self) -> SequenceNumber {
        match self {
            Packet::Request(r) => r.seq,
            Packet::Response(r) => r.seq,
            Packet::Event(e) => e.seq,
        }
    }
}

/// Script description as returned by `scripts` and `afterCompile`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptInfo {
    pub id: ScriptId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub line_offset: i64,
    #[serde(default)]
    pub column_offset: i64,
    #[serde(default)]
    pub line_count: Option<u64>,
}

/// Body of a `break` or `exception` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakInfo {
    #[serde(default)]
    pub invocation_text: Option<String>,
    #[serde(default)]
    pub source_line: Option<i64>,
    #[serde(default)]
    pub source_column: Option<i64>,
    #[serde(default)]
    pub source_line_text: Option<String>,
    #[serde(default)]
    pub script: Option<ScriptInfo>,
    #[serde(default)]
    pub breakpoints: Vec<i64>,
    /// Present on `exception` events
    #[serde(default)]
    pub exception: Option<Value>,
    #[serde(default)]
    pub uncaught: Option<bool>,
}

/// Step granularity for `continue`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepAction {
    In,
    Next,
    Out,
}

impl StepAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepAction::In => "in",
            StepAction::Next => "next",
            StepAction::Out => "out",
        }
    }
}

/// Where a breakpoint is placed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakpointTarget {
    Script(String),
    ScriptId(ScriptId),
    Function(String),
}

impl BreakpointTarget {
    /// `(type, target)` pair for `setbreakpoint` arguments
    pub fn to_arguments(&self) -> (&'static str, Value) {
        match self {
            BreakpointTarget::Script(name) => ("script", Value::String(name.clone())),
            BreakpointTarget::ScriptId(id) => ("scriptId", Value::from(*id)),
            BreakpointTarget::Function(name) => ("function", Value::String(name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_packet_tagged_by_type() {
        let packet: Packet = serde_json::from_value(json!({
            "seq": 9,
            "type": "event",
            "event": "break",
            "body": { "sourceLine": 4 }
        }))
        .unwrap();

        assert_eq!(packet.kind(), PacketKind::Event);
        assert_eq!(packet.seq(), 9);
        match packet {
            Packet::Event(event) => {
                let info: BreakInfo = event.body_as().unwrap();
                assert_eq!(info.source_line, Some(4));
                assert!(info.breakpoints.is_empty());
            }
            other => panic!("Expected event, got {:?}", other),
        }
    }

    #[test]
    fn test_response_defaults() {
        let response: Response = serde_json::from_value(json!({
            "request_seq": 3,
            "success": false,
        }))
        .unwrap();

        assert!(!response.running);
        assert!(response.refs.is_empty());
        assert_eq!(response.failure_message(), "command '' failed");
    }

    #[test]
    fn test_script_info_camel_case() {
        let script: ScriptInfo = serde_json::from_value(json!({
            "id": 17,
            "name": "foo.js",
            "source": "function f(){}",
            "lineOffset": 3
        }))
        .unwrap();

        assert_eq!(script.id, 17);
        assert_eq!(script.line_offset, 3);
        assert_eq!(script.column_offset, 0);
    }

    #[test]
    fn test_breakpoint_target_arguments() {
        let (kind, target) = BreakpointTarget::ScriptId(42).to_arguments();
        assert_eq!(kind, "scriptId");
        assert_eq!(target, json!(42));
    }
}
