//! Debugger Agent - the public operation surface
//!
//! One agent per debugging session. It owns the sequencer, the dispatcher,
//! the net registry and the break/run state; nothing is shared between two
//! agents in the same process.
//!
//! Inbound packets are handled strictly in arrival order. Anything that has
//! to wait for a later packet (draining queued commands after a break) is
//! spawned, so the reader never waits on itself.

use std::sync::{Arc, Mutex};

use dashmap::DashSet;
use debugger_protocol::{
    decode, encode, BreakInfo, BreakpointTarget, Event, Handle, Packet, Response, ScriptInfo,
    SequenceNumber, StepAction,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::config::AgentConfig;
use crate::diagnostics::{Diagnostic, DiagnosticLog};
use crate::dispatcher::{EventCallback, EventDispatcher};
use crate::error::{AgentError, Result};
use crate::events::{AgentEvent, EventBus};
use crate::net::{NetAgent, Resource, ResourceError, ResourcePhase};
use crate::observer::ObserverSet;
use crate::sequencer::{into_remote, CommandSequencer, CorrelationError, Remote};
use crate::state::{AgentState, BreakRunMachine, ShellState};
use crate::transport::{Transport, WebSocketTransport};

/// Unwrap a remote success or hand the failure back to the caller as-is
macro_rules! remote {
    ($outcome:expr) => {
        match $outcome {
            Ok(value) => value,
            Err(failure) => return Ok(Err(failure)),
        }
    };
}

/// Inspector domains that can be switched on and off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    Debugger,
    Network,
    Dom,
    Console,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Debugger => "Debugger",
            Domain::Network => "Network",
            Domain::Dom => "DOM",
            Domain::Console => "Console",
        }
    }
}

/// Result of `evaluate`, with handle references already resolved
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: Value,
    pub running: bool,
}

impl Evaluation {
    /// Backend's printable rendering of the value
    pub fn text(&self) -> Option<&str> {
        self.value.get("text").and_then(Value::as_str)
    }

    pub fn value_type(&self) -> Option<&str> {
        self.value.get("type").and_then(Value::as_str)
    }
}

/// Events the agent interprets before subscribers see them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuiltinEvent {
    Break,
    Exception,
    Exit,
    OnAttach,
    OnDisconnect,
    Response,
    AfterCompile,
    SetDebuggerBreak,
    AppendText,
    FocusOnCommandLine,
    Net(ResourcePhase),
    Reset,
}

impl BuiltinEvent {
    fn parse(name: &str) -> Option<Self> {
        let builtin = match name {
            "break" => BuiltinEvent::Break,
            "exception" => BuiltinEvent::Exception,
            "exit" => BuiltinEvent::Exit,
            "on_attach" => BuiltinEvent::OnAttach,
            "on_disconnect" => BuiltinEvent::OnDisconnect,
            "response" => BuiltinEvent::Response,
            "afterCompile" => BuiltinEvent::AfterCompile,
            "setDebuggerBreak" => BuiltinEvent::SetDebuggerBreak,
            "appendText" => BuiltinEvent::AppendText,
            "focusOnCommandLine" => BuiltinEvent::FocusOnCommandLine,
            "reset" => BuiltinEvent::Reset,
            other => BuiltinEvent::Net(ResourcePhase::from_event(other)?),
        };
        Some(builtin)
    }
}

#[derive(Deserialize)]
struct AfterCompileBody {
    script: ScriptInfo,
}

#[derive(Deserialize)]
struct SetBreakpointBody {
    breakpoint: i64,
}

pub struct DebuggerAgent {
    config: AgentConfig,
    transport: Arc<dyn Transport>,
    sequencer: CommandSequencer,
    dispatcher: EventDispatcher,
    net: NetAgent,
    observers: ObserverSet,
    diagnostics: Arc<DiagnosticLog>,
    state: BreakRunMachine,
    shell: Mutex<ShellState>,
    domains: DashSet<Domain>,
    event_bus: EventBus,
}

impl DebuggerAgent {
    pub fn new(
        transport: Arc<dyn Transport>,
        config: AgentConfig,
        observers: ObserverSet,
    ) -> Arc<Self> {
        let event_bus = EventBus::new();
        let diagnostics = Arc::new(DiagnosticLog::new(
            config.diagnostic_history,
            event_bus.clone(),
        ));

        tracing::debug!(
            "[DebuggerAgent] New session {} with {} observer(s)",
            config.session_id,
            observers.len()
        );

        Arc::new(Self {
            config,
            transport,
            sequencer: CommandSequencer::new(),
            dispatcher: EventDispatcher::new(diagnostics.clone()),
            net: NetAgent::new(),
            observers,
            diagnostics,
            state: BreakRunMachine::new(),
            shell: Mutex::new(ShellState::default()),
            domains: DashSet::new(),
            event_bus,
        })
    }

    /// Connect to `config.endpoint` over WebSocket and start reading
    pub async fn connect(config: AgentConfig, observers: ObserverSet) -> Result<Arc<Self>> {
        let endpoint = config.endpoint_url()?;
        let (mut transport, inbound) = WebSocketTransport::connect(&endpoint).await?;
        if let Some(nudge) = &config.yield_message {
            transport = transport.with_nudge(nudge.clone());
        }
        let agent = Self::new(Arc::new(transport), config, observers);
        agent.spawn_reader(inbound);
        Ok(agent)
    }

    /// Feed every inbound message to `handle_message`, in order
    pub fn spawn_reader(
        self: &Arc<Self>,
        mut inbound: mpsc::UnboundedReceiver<String>,
    ) -> JoinHandle<()> {
        let agent = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(raw) = inbound.recv().await {
                agent.handle_message(&raw).await;
            }
            let dropped = agent.sequencer.fail_all();
            tracing::info!(
                "[DebuggerAgent] Inbound channel closed, {} pending command(s) dropped",
                dropped
            );
        })
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    /// Handle one raw message from the backend
    ///
    /// Never fails: undecodable or unmatched packets are reported to the
    /// diagnostic log and processing continues with the next message.
    pub async fn handle_message(self: &Arc<Self>, raw: &str) {
        let packet = match decode(raw) {
            Ok(packet) => packet,
            Err(e) => {
                self.diagnostics.report(Diagnostic::decode(raw, &e));
                return;
            }
        };

        match packet {
            Packet::Response(response) => self.handle_response(response).await,
            Packet::Event(event) => self.handle_event(event).await,
            Packet::Request(request) => {
                self.diagnostics.report(Diagnostic::UnexpectedRequest {
                    seq: request.seq,
                    command: request.command,
                });
            }
        }
    }

    async fn handle_response(&self, response: Response) {
        tracing::debug!(
            "[DebuggerAgent] <- response {} '{}' success={} running={}",
            response.request_seq,
            response.command,
            response.success,
            response.running
        );

        // the issued command decides, not whatever the response echoes back
        let issued = self.sequencer.pending_command(response.request_seq);
        if let Some(command) = issued {
            if self.state.on_response(&command, response.running) {
                self.state_changed(AgentState::Running).await;
            }
        }

        self.observers.on_response(&response).await;

        if let Err(CorrelationError::Unmatched {
            request_seq,
            command,
        }) = self.sequencer.complete(response)
        {
            self.diagnostics.report(Diagnostic::UnmatchedResponse {
                request_seq,
                command,
            });
        }
    }

    async fn handle_event(self: &Arc<Self>, event: Event) {
        tracing::debug!("[DebuggerAgent] <- event '{}'", event.event);

        let Some(builtin) = BuiltinEvent::parse(&event.event) else {
            self.dispatcher.dispatch(&event);
            return;
        };

        match builtin {
            BuiltinEvent::Break | BuiltinEvent::Exception => {
                let info: BreakInfo = self.event_body(&event).unwrap_or_default();
                if self.state.on_break() {
                    self.state_changed(AgentState::Broken).await;
                }
                self.observers.on_break(&info).await;
                self.schedule_drain();
            }

            BuiltinEvent::Exit => {
                if self.state.transition(AgentState::Running) {
                    self.state_changed(AgentState::Running).await;
                }
                self.event_bus.publish(AgentEvent::Exited);
                self.observers.on_exit().await;
            }

            BuiltinEvent::OnAttach => {
                self.update_shell(|shell| shell.attached = true);
                self.event_bus.publish(AgentEvent::Attached);
                self.observers.on_attach().await;
            }

            BuiltinEvent::OnDisconnect => {
                self.update_shell(|shell| shell.attached = false);
                let dropped = self.sequencer.fail_all();
                if dropped > 0 {
                    tracing::warn!(
                        "[DebuggerAgent] Disconnected with {} pending command(s)",
                        dropped
                    );
                }
                if self.state.transition(AgentState::Running) {
                    self.state_changed(AgentState::Running).await;
                }
                self.event_bus.publish(AgentEvent::Detached);
                self.observers.on_detach().await;
            }

            BuiltinEvent::Response => {
                // Legacy relay: the body is a complete response packet
                if let Some(inner) = self.event_body::<Response>(&event) {
                    self.handle_response(inner).await;
                }
            }

            BuiltinEvent::AfterCompile => {
                if let Some(body) = self.event_body::<AfterCompileBody>(&event) {
                    self.script_parsed(&body.script).await;
                }
            }

            BuiltinEvent::SetDebuggerBreak => {
                let enabled = flag(event.body.as_ref());
                self.update_shell(|shell| shell.debugger_break = enabled);
                self.event_bus
                    .publish(AgentEvent::DebuggerBreakChanged(enabled));
            }

            BuiltinEvent::AppendText => {
                let text = text(event.body.as_ref());
                self.update_shell(|shell| shell.output.push(text.clone()));
                self.event_bus.publish(AgentEvent::TextAppended(text));
            }

            BuiltinEvent::FocusOnCommandLine => {
                self.update_shell(|shell| shell.command_line_focused = true);
                self.event_bus.publish(AgentEvent::CommandLineFocused);
            }

            BuiltinEvent::Net(phase) => {
                let body = event.body.clone().unwrap_or(Value::Null);
                match self.net.apply(phase, &body) {
                    Ok(resource) => {
                        self.observers
                            .on_resource_lifecycle(&resource.identifier, phase, &resource)
                            .await;
                    }
                    Err(ResourceError::Unknown { identifier, phase }) => {
                        self.diagnostics
                            .report(Diagnostic::UnknownResource { identifier, phase });
                    }
                    Err(e @ ResourceError::Malformed { .. }) => {
                        self.diagnostics.report(Diagnostic::MalformedEvent {
                            name: event.event.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }

            BuiltinEvent::Reset => {
                self.net.reset();
                self.event_bus.publish(AgentEvent::ResourcesReset);
            }
        }

        self.dispatcher.notify(&event);
    }

    fn event_body<T: DeserializeOwned>(&self, event: &Event) -> Option<T> {
        match event.body_as::<T>() {
            Ok(body) => Some(body),
            Err(e) => {
                self.diagnostics.report(Diagnostic::MalformedEvent {
                    name: event.event.clone(),
                    error: e.to_string(),
                });
                None
            }
        }
    }

    async fn state_changed(&self, state: AgentState) {
        tracing::info!("[DebuggerAgent] State -> {:?}", state);
        self.update_shell(|shell| shell.input_enabled = state.is_broken());
        self.event_bus.publish(AgentEvent::StateChanged(state));
        self.observers.on_state_changed(state).await;
    }

    async fn script_parsed(&self, script: &ScriptInfo) {
        self.observers
            .on_script_parsed(
                script.id,
                script.name.as_deref().unwrap_or(""),
                script.source.as_deref().unwrap_or(""),
                script.line_offset,
            )
            .await;
    }

    fn update_shell(&self, apply: impl FnOnce(&mut ShellState)) {
        let mut shell = self.shell.lock().unwrap_or_else(|e| e.into_inner());
        apply(&mut shell);
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Send a command and wait for its response
    ///
    /// The transport is asked to yield to the remote side after sending, so
    /// the backend gets a chance to service the request. A backend that
    /// never answers costs one timeout; the pending entry is removed.
    pub async fn send_command(
        &self,
        command: &str,
        arguments: Option<Value>,
    ) -> Result<Remote<Response>> {
        let (request, rx) = self.sequencer.issue(command, arguments);
        let seq = request.seq;

        let raw = match encode(&request.command, seq, request.arguments.as_ref()) {
            Ok(raw) => raw,
            Err(e) => {
                self.sequencer.cancel(seq);
                return Err(e.into());
            }
        };

        tracing::debug!("[DebuggerAgent] -> {} (seq {})", command, seq);
        if let Err(e) = self.deliver(raw).await {
            self.sequencer.cancel(seq);
            return Err(e);
        }

        self.await_response(seq, command, rx).await
    }

    async fn deliver(&self, raw: String) -> Result<()> {
        self.transport.send_raw(raw).await?;
        self.transport.yield_to_remote().await
    }

    async fn await_response(
        &self,
        seq: SequenceNumber,
        command: &str,
        rx: oneshot::Receiver<Response>,
    ) -> Result<Remote<Response>> {
        let timeout = self.config.command_timeout();
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(into_remote(response)),
            Ok(Err(_)) => Err(AgentError::Closed),
            Err(_) => {
                self.sequencer.cancel(seq);
                tracing::warn!(
                    "[DebuggerAgent] '{}' (seq {}) got no response within {:?}",
                    command,
                    seq,
                    timeout
                );
                Err(AgentError::Timeout {
                    seq,
                    command: command.to_string(),
                    elapsed: timeout,
                })
            }
        }
    }

    /// Queue a command; it is sent once the backend is paused
    ///
    /// While broken the queue is drained right away. While running it waits
    /// for the next `break` or an explicit [`process_queue`](Self::process_queue).
    pub fn enqueue(
        self: &Arc<Self>,
        command: impl Into<String>,
        arguments: Option<Value>,
    ) -> oneshot::Receiver<Result<Remote<Response>>> {
        let rx = self.sequencer.enqueue(command, arguments);
        if self.state().is_broken() {
            self.schedule_drain();
        }
        rx
    }

    /// Send queued commands one at a time, in FIFO order
    ///
    /// Returns how many commands this call sent. Zero when another drain is
    /// already running.
    pub async fn process_queue(&self) -> usize {
        let mut processed = 0;
        while self.sequencer.try_begin_drain() {
            while let Some(queued) = self.sequencer.pop_queued() {
                let outcome = self.send_command(&queued.command, queued.arguments).await;
                let _ = queued.reply.send(outcome);
                processed += 1;
            }
            self.sequencer.end_drain();
            // a command queued between the last pop and end_drain
            if self.sequencer.queued() == 0 {
                break;
            }
        }
        processed
    }

    fn schedule_drain(self: &Arc<Self>) {
        if self.sequencer.queued() == 0 {
            return;
        }
        let agent = Arc::clone(self);
        tokio::spawn(async move {
            let sent = agent.process_queue().await;
            tracing::debug!("[DebuggerAgent] Drained {} queued command(s)", sent);
        });
    }

    fn parse_body<T: DeserializeOwned>(command: &str, body: Option<Value>) -> Result<T> {
        serde_json::from_value(body.unwrap_or(Value::Null)).map_err(|e| {
            AgentError::UnexpectedBody {
                command: command.to_string(),
                reason: e.to_string(),
            }
        })
    }

    /// Body with every `{"ref": n}` replaced by the response's own ref object
    fn resolve_body(&self, response: &Response) -> Value {
        match &response.body {
            Some(body) => response.handles().resolve(body, self.config.max_ref_depth),
            None => Value::Null,
        }
    }

    // ------------------------------------------------------------------
    // Debugger domain
    // ------------------------------------------------------------------

    /// List scripts and report each one to the observers
    pub async fn request_scripts(&self) -> Result<Remote<Vec<ScriptInfo>>> {
        let arguments = json!({ "includeSource": self.config.include_source });
        let response = remote!(self.send_command("scripts", Some(arguments)).await?);

        let scripts: Vec<ScriptInfo> = Self::parse_body("scripts", response.body)?;
        for script in &scripts {
            self.script_parsed(script).await;
        }
        Ok(Ok(scripts))
    }

    pub async fn evaluate(&self, expression: &str) -> Result<Remote<Evaluation>> {
        self.evaluate_in_frame(expression, None).await
    }

    /// Evaluate in a stack frame, or globally when `frame` is `None`
    pub async fn evaluate_in_frame(
        &self,
        expression: &str,
        frame: Option<u32>,
    ) -> Result<Remote<Evaluation>> {
        let mut arguments = json!({
            "expression": expression,
            "disable_break": true,
        });
        match frame {
            Some(frame) => arguments["frame"] = json!(frame),
            None => arguments["global"] = json!(true),
        }

        let response = remote!(self.send_command("evaluate", Some(arguments)).await?);
        Ok(Ok(Evaluation {
            value: self.resolve_body(&response),
            running: response.running,
        }))
    }

    /// Resume execution. Returns the backend's `running` flag.
    pub async fn resume(&self) -> Result<Remote<bool>> {
        let response = remote!(self.send_command("continue", None).await?);
        Ok(Ok(response.running))
    }

    pub async fn step(&self, action: StepAction, count: u32) -> Result<Remote<bool>> {
        let arguments = json!({
            "stepaction": action.as_str(),
            "stepcount": count.max(1),
        });
        let response = remote!(self.send_command("continue", Some(arguments)).await?);
        Ok(Ok(response.running))
    }

    /// Returns the backend-assigned breakpoint number
    pub async fn set_breakpoint(
        &self,
        target: &BreakpointTarget,
        line: Option<u32>,
        condition: Option<&str>,
    ) -> Result<Remote<i64>> {
        let (kind, target) = target.to_arguments();
        let mut arguments = json!({
            "type": kind,
            "target": target,
            "enabled": true,
        });
        if let Some(line) = line {
            arguments["line"] = json!(line);
        }
        if let Some(condition) = condition {
            arguments["condition"] = json!(condition);
        }

        let response = remote!(self.send_command("setbreakpoint", Some(arguments)).await?);
        let body: SetBreakpointBody = Self::parse_body("setbreakpoint", response.body)?;
        Ok(Ok(body.breakpoint))
    }

    pub async fn clear_breakpoint(&self, breakpoint: i64) -> Result<Remote<()>> {
        let arguments = json!({ "breakpoint": breakpoint });
        remote!(self.send_command("clearbreakpoint", Some(arguments)).await?);
        Ok(Ok(()))
    }

    pub async fn backtrace(&self) -> Result<Remote<Value>> {
        let response = remote!(self.send_command("backtrace", None).await?);
        Ok(Ok(self.resolve_body(&response)))
    }

    pub async fn frame(&self, number: u32) -> Result<Remote<Value>> {
        let arguments = json!({ "number": number });
        let response = remote!(self.send_command("frame", Some(arguments)).await?);
        Ok(Ok(self.resolve_body(&response)))
    }

    /// Fetch full descriptions of objects by handle
    pub async fn lookup(&self, handles: &[Handle]) -> Result<Remote<Value>> {
        let arguments = json!({ "handles": handles, "includeSource": false });
        let response = remote!(self.send_command("lookup", Some(arguments)).await?);
        Ok(Ok(self.resolve_body(&response)))
    }

    pub async fn source(&self, frame: Option<u32>) -> Result<Remote<Value>> {
        let arguments = frame.map(|frame| json!({ "frame": frame }));
        let response = remote!(self.send_command("source", arguments).await?);
        Ok(Ok(response.body.unwrap_or(Value::Null)))
    }

    // ------------------------------------------------------------------
    // Inspector domains
    // ------------------------------------------------------------------

    pub async fn enable_domain(&self, domain: Domain) -> Result<Remote<()>> {
        let arguments = json!({ "domain": domain.as_str() });
        remote!(self.send_command("enable", Some(arguments)).await?);
        self.domains.insert(domain);
        Ok(Ok(()))
    }

    pub async fn disable_domain(&self, domain: Domain) -> Result<Remote<()>> {
        let arguments = json!({ "domain": domain.as_str() });
        remote!(self.send_command("disable", Some(arguments)).await?);
        self.domains.remove(&domain);
        Ok(Ok(()))
    }

    pub fn is_domain_enabled(&self, domain: Domain) -> bool {
        self.domains.contains(&domain)
    }

    pub async fn highlight_node(&self, node_id: u64) -> Result<Remote<()>> {
        let arguments = json!({ "nodeId": node_id });
        remote!(self.send_command("highlightDOMNode", Some(arguments)).await?);
        Ok(Ok(()))
    }

    pub async fn hide_node_highlight(&self) -> Result<Remote<()>> {
        remote!(self.send_command("hideDOMNodeHighlight", None).await?);
        Ok(Ok(()))
    }

    // ------------------------------------------------------------------
    // State and views
    // ------------------------------------------------------------------

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn state(&self) -> AgentState {
        self.state.current()
    }

    pub fn state_changes(&self) -> watch::Receiver<AgentState> {
        self.state.subscribe()
    }

    pub fn shell_state(&self) -> ShellState {
        self.shell.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Register a handler for a protocol event
    pub fn subscribe(&self, event: impl Into<String>, callback: EventCallback) {
        self.dispatcher.subscribe(event, callback);
    }

    /// Drop every handler for a protocol event. Returns how many were removed.
    pub fn unsubscribe(&self, event: &str) -> usize {
        self.dispatcher.unsubscribe_all(event)
    }

    pub fn is_subscribed(&self, event: &str) -> bool {
        self.dispatcher.has_handlers(event)
    }

    pub fn events(&self) -> broadcast::Receiver<AgentEvent> {
        self.event_bus.subscribe()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.snapshot()
    }

    pub fn resources(&self) -> Vec<Resource> {
        self.net.all()
    }

    pub fn resource(&self, identifier: &str) -> Option<Resource> {
        self.net.get(identifier)
    }

    pub fn outstanding_commands(&self) -> usize {
        self.sequencer.outstanding()
    }

    pub fn queued_commands(&self) -> usize {
        self.sequencer.queued()
    }

    /// Fail every pending and queued command and close the transport
    pub async fn close(&self) -> Result<()> {
        let dropped = self.sequencer.fail_all();
        tracing::info!(
            "[DebuggerAgent] Closing session {} ({} pending command(s) dropped)",
            self.config.session_id,
            dropped
        );
        self.transport.close().await
    }
}

/// `setDebuggerBreak` body: a bare bool or `{"enabled": bool}`
fn flag(body: Option<&Value>) -> bool {
    match body {
        Some(Value::Bool(b)) => *b,
        Some(Value::Object(map)) => map.get("enabled").and_then(Value::as_bool).unwrap_or(true),
        _ => true,
    }
}

/// `appendText` body: a bare string or `{"text": string}`
fn text(body: Option<&Value>) -> String {
    match body {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => map
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    }
}
