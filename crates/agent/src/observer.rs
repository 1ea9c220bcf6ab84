//! Observer System - UI-side collaborators of the agent
//!
//! The agent never renders anything. Whatever sits on top of it (a console,
//! a script list, a network panel) implements [`AgentObserver`] and is handed
//! to the agent at construction time.

use std::sync::Arc;

use async_trait::async_trait;
use debugger_protocol::{BreakInfo, Response, ScriptId};
use futures_util::future::join_all;

use crate::net::{Resource, ResourcePhase};
use crate::state::AgentState;

/// Receives agent notifications. Every method has a no-op default.
#[async_trait]
pub trait AgentObserver: Send + Sync {
    /// Human-readable name for logging
    fn name(&self) -> &str;

    /// Execution paused at a breakpoint, step or exception
    async fn on_break(&self, _info: &BreakInfo) {}

    async fn on_script_parsed(
        &self,
        _id: ScriptId,
        _name: &str,
        _source: &str,
        _line_offset: i64,
    ) {
    }

    async fn on_resource_lifecycle(
        &self,
        _identifier: &str,
        _phase: ResourcePhase,
        _resource: &Resource,
    ) {
    }

    async fn on_state_changed(&self, _state: AgentState) {}

    /// Every response, before it is handed to the issuing caller
    async fn on_response(&self, _response: &Response) {}

    async fn on_exit(&self) {}

    async fn on_attach(&self) {}

    async fn on_detach(&self) {}
}

/// Fixed set of observers, notified together
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Vec<Arc<dyn AgentObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Arc<dyn AgentObserver>) {
        tracing::debug!("Registered observer: {}", observer.name());
        self.observers.push(observer);
    }

    pub fn with(mut self, observer: Arc<dyn AgentObserver>) -> Self {
        self.register(observer);
        self
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub async fn on_break(&self, info: &BreakInfo) {
        join_all(self.observers.iter().map(|o| o.on_break(info))).await;
    }

    pub async fn on_script_parsed(&self, id: ScriptId, name: &str, source: &str, line_offset: i64) {
        join_all(
            self.observers
                .iter()
                .map(|o| o.on_script_parsed(id, name, source, line_offset)),
        )
        .await;
    }

    pub async fn on_resource_lifecycle(
        &self,
        identifier: &str,
        phase: ResourcePhase,
        resource: &Resource,
    ) {
        join_all(
            self.observers
                .iter()
                .map(|o| o.on_resource_lifecycle(identifier, phase, resource)),
        )
        .await;
    }

    pub async fn on_state_changed(&self, state: AgentState) {
        join_all(self.observers.iter().map(|o| o.on_state_changed(state))).await;
    }

    pub async fn on_response(&self, response: &Response) {
        join_all(self.observers.iter().map(|o| o.on_response(response))).await;
    }

    pub async fn on_exit(&self) {
        join_all(self.observers.iter().map(|o| o.on_exit())).await;
    }

    pub async fn on_attach(&self) {
        join_all(self.observers.iter().map(|o| o.on_attach())).await;
    }

    pub async fn on_detach(&self) {
        join_all(self.observers.iter().map(|o| o.on_detach())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingObserver {
        name: String,
        breaks: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AgentObserver for CountingObserver {
        fn name(&self) -> &str {
            &self.name
        }

        async fn on_break(&self, _info: &BreakInfo) {
            self.breaks.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_observer_fan_out() {
        let counter = Arc::new(AtomicUsize::new(0));
        let observers = ObserverSet::new()
            .with(Arc::new(CountingObserver {
                name: "console".to_string(),
                breaks: counter.clone(),
            }))
            .with(Arc::new(CountingObserver {
                name: "sources".to_string(),
                breaks: counter.clone(),
            }));

        observers.on_break(&BreakInfo::default()).await;
        // defaults are no-ops
        observers.on_exit().await;

        assert_eq!(observers.len(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
