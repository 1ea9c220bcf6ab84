//! Shared helpers for integration tests.
//!
//! The test plays the backend: it reads what the agent sends from the
//! channel transport and answers through `DebuggerAgent::handle_message`.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use debugger_agent::{
    AgentConfig, AgentObserver, AgentState, ChannelTransport, DebuggerAgent, ObserverSet,
    Resource, ResourcePhase,
};
use debugger_protocol::{decode, BreakInfo, Packet, Request, ScriptId};
use tokio::sync::mpsc;

/// Records every notification it receives
#[derive(Default)]
pub struct RecordingObserver {
    pub scripts: Mutex<Vec<(ScriptId, String, String, i64)>>,
    pub breaks: Mutex<Vec<BreakInfo>>,
    pub states: Mutex<Vec<AgentState>>,
    pub resources: Mutex<Vec<(String, ResourcePhase)>>,
    pub responses: Mutex<Vec<u64>>,
    pub exits: Mutex<usize>,
}

impl RecordingObserver {
    pub fn scripts(&self) -> Vec<(ScriptId, String, String, i64)> {
        self.scripts.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<AgentState> {
        self.states.lock().unwrap().clone()
    }

    pub fn break_count(&self) -> usize {
        self.breaks.lock().unwrap().len()
    }

    pub fn resource_phases(&self) -> Vec<(String, ResourcePhase)> {
        self.resources.lock().unwrap().clone()
    }
}

#[async_trait]
impl AgentObserver for RecordingObserver {
    fn name(&self) -> &str {
        "recording"
    }

    async fn on_break(&self, info: &BreakInfo) {
        self.breaks.lock().unwrap().push(info.clone());
    }

    async fn on_script_parsed(&self, id: ScriptId, name: &str, source: &str, line_offset: i64) {
        self.scripts
            .lock()
            .unwrap()
            .push((id, name.to_string(), source.to_string(), line_offset));
    }

    async fn on_resource_lifecycle(
        &self,
        identifier: &str,
        phase: ResourcePhase,
        _resource: &Resource,
    ) {
        self.resources
            .lock()
            .unwrap()
            .push((identifier.to_string(), phase));
    }

    async fn on_state_changed(&self, state: AgentState) {
        self.states.lock().unwrap().push(state);
    }

    async fn on_response(&self, response: &debugger_protocol::Response) {
        self.responses.lock().unwrap().push(response.request_seq);
    }

    async fn on_exit(&self) {
        *self.exits.lock().unwrap() += 1;
    }
}

pub struct Harness {
    pub agent: Arc<DebuggerAgent>,
    pub outbound: mpsc::UnboundedReceiver<String>,
    pub observer: Arc<RecordingObserver>,
}

impl Harness {
    /// Next raw message the agent sent
    pub async fn next_raw(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(2), self.outbound.recv())
            .await
            .expect("agent should send a message")
            .expect("transport should stay open")
    }

    /// Next message the agent sent, decoded as a request
    pub async fn next_request(&mut self) -> Request {
        let raw = self.next_raw().await;
        match decode(&raw).expect("agent should send valid JSON") {
            Packet::Request(request) => request,
            other => panic!("Expected request, got {:?}", other),
        }
    }

    pub fn nothing_sent(&mut self) -> bool {
        self.outbound.try_recv().is_err()
    }

    /// Answer `request` with a successful response
    pub async fn respond(&self, request: &Request, running: bool, body: serde_json::Value) {
        let raw = serde_json::json!({
            "seq": request.seq + 1000,
            "type": "response",
            "request_seq": request.seq,
            "command": request.command,
            "success": true,
            "running": running,
            "body": body,
        });
        self.agent.handle_message(&raw.to_string()).await;
    }

    pub async fn event(&self, name: &str, body: serde_json::Value) {
        let raw = serde_json::json!({
            "seq": 0,
            "type": "event",
            "event": name,
            "body": body,
        });
        self.agent.handle_message(&raw.to_string()).await;
    }
}

pub fn harness() -> Harness {
    harness_with(AgentConfig::default().with_command_timeout(Duration::from_secs(2)))
}

pub fn harness_with(config: AgentConfig) -> Harness {
    let (transport, outbound) = ChannelTransport::new();
    let observer = Arc::new(RecordingObserver::default());
    let observers = ObserverSet::new().with(observer.clone());
    let agent = DebuggerAgent::new(Arc::new(transport), config, observers);
    Harness {
        agent,
        outbound,
        observer,
    }
}
