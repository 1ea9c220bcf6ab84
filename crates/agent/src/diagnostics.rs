//! Diagnostics - developer-facing reports that never reach a command caller
//!
//! Anything the agent receives but cannot use ends up here: undecodable
//! packets, responses nobody waits for, events nobody handles. Nothing is
//! dropped silently, so protocol drift between frontend and backend shows up
//! in logs and tests.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;

use debugger_protocol::{DecodeError, SequenceNumber};

use crate::events::{AgentEvent, EventBus};
use crate::net::ResourcePhase;

const RAW_EXCERPT_CHARS: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Inbound message could not be decoded
    Decode { excerpt: String, error: String },

    /// Response whose `request_seq` matches no outstanding command
    UnmatchedResponse {
        request_seq: SequenceNumber,
        command: String,
    },

    /// Event no handler is registered for
    UnknownEvent { name: String },

    /// Known event whose body has the wrong shape
    MalformedEvent { name: String, error: String },

    /// Backend sent a request; this agent never serves requests
    UnexpectedRequest {
        seq: SequenceNumber,
        command: String,
    },

    /// Net lifecycle event for an identifier that was never announced
    UnknownResource {
        identifier: String,
        phase: ResourcePhase,
    },
}

impl Diagnostic {
    pub fn decode(raw: &str, error: &DecodeError) -> Self {
        Diagnostic::Decode {
            excerpt: raw.chars().take(RAW_EXCERPT_CHARS).collect(),
            error: error.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Decode { excerpt, error } => {
                write!(f, "Failed to decode message ({}): {}", error, excerpt)
            }
            Diagnostic::UnmatchedResponse {
                request_seq,
                command,
            } => write!(
                f,
                "Response for unknown request {} (command '{}')",
                request_seq, command
            ),
            Diagnostic::UnknownEvent { name } => write!(f, "Unknown event: {}", name),
            Diagnostic::MalformedEvent { name, error } => {
                write!(f, "Malformed '{}' event: {}", name, error)
            }
            Diagnostic::UnexpectedRequest { seq, command } => {
                write!(f, "Unexpected request from backend: {} (seq {})", command, seq)
            }
            Diagnostic::UnknownResource { identifier, phase } => write!(
                f,
                "{} for unknown resource {}",
                phase.as_str(),
                identifier
            ),
        }
    }
}

/// Bounded in-memory log of diagnostics, mirrored to tracing and the bus
pub struct DiagnosticLog {
    entries: Mutex<VecDeque<Diagnostic>>,
    capacity: usize,
    bus: EventBus,
}

impl DiagnosticLog {
    pub fn new(capacity: usize, bus: EventBus) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
            bus,
        }
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        tracing::warn!("[Diagnostics] {}", diagnostic);
        {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            if entries.len() == self.capacity {
                entries.pop_front();
            }
            entries.push_back(diagnostic.clone());
        }
        self.bus.publish(AgentEvent::Diagnostic(diagnostic));
    }

    /// Snapshot, oldest first
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_event_display() {
        let d = Diagnostic::UnknownEvent {
            name: "frobnicate".to_string(),
        };
        assert_eq!(d.to_string(), "Unknown event: frobnicate");
    }

    #[test]
    fn test_log_is_bounded() {
        let log = DiagnosticLog::new(2, EventBus::new());
        for name in ["a", "b", "c"] {
            log.report(Diagnostic::UnknownEvent {
                name: name.to_string(),
            });
        }

        let names: Vec<_> = log
            .snapshot()
            .into_iter()
            .map(|d| d.to_string())
            .collect();
        assert_eq!(names, vec!["Unknown event: b", "Unknown event: c"]);
    }

    #[tokio::test]
    async fn test_reports_reach_the_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let log = DiagnosticLog::new(8, bus);

        log.report(Diagnostic::UnmatchedResponse {
            request_seq: 99,
            command: "scripts".to_string(),
        });

        match rx.recv().await.unwrap() {
            AgentEvent::Diagnostic(Diagnostic::UnmatchedResponse { request_seq, .. }) => {
                assert_eq!(request_seq, 99)
            }
            other => panic!("Expected diagnostic, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_excerpt_is_truncated() {
        let raw = "x".repeat(1000);
        let error = debugger_protocol::decode(&raw).unwrap_err();
        match Diagnostic::decode(&raw, &error) {
            Diagnostic::Decode { excerpt, .. } => assert_eq!(excerpt.len(), RAW_EXCERPT_CHARS),
            other => panic!("Expected decode diagnostic, got {:?}", other),
        }
    }
}
