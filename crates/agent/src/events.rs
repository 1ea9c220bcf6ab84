//! Event Bus - agent-level notifications
//!
//! Protocol events go through the [`EventDispatcher`](crate::dispatcher::EventDispatcher).
//! This bus carries what the agent itself decided: state transitions, shell
//! updates and diagnostics.

use tokio::sync::broadcast;

use crate::diagnostics::Diagnostic;
use crate::state::AgentState;

/// Notifications published by an agent
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    StateChanged(AgentState),
    Attached,
    Detached,
    Exited,
    DebuggerBreakChanged(bool),
    TextAppended(String),
    CommandLineFocused,
    ResourcesReset,
    Diagnostic(Diagnostic),
}

/// Simple event bus using tokio broadcast channel
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Publish an event
    pub fn publish(&self, event: AgentEvent) {
        let _ = self.tx.send(event); // Ignore error if no subscribers
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish(AgentEvent::StateChanged(AgentState::Broken));

        match rx.recv().await {
            Ok(AgentEvent::StateChanged(AgentState::Broken)) => {}
            other => panic!("Expected StateChanged(Broken), got {:?}", other),
        }
    }
}
