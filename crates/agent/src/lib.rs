//! Debugger Agent
//!
//! The UI side of a debugger/inspector protocol: JSON requests, responses
//! and events over a single string channel.
//!
//! # Architecture
//!
//! 1. **Transport**: opaque string pipe (WebSocket or in-process channel)
//! 2. **Sequencer**: sequence numbers, pending commands, FIFO command queue
//! 3. **Dispatcher**: event name → handlers; unknown events are reported
//! 4. **Agent**: the facade that turns the above into debugger operations
//!
//! ```text
//! backend ──raw──▶ DebuggerAgent::handle_message ──▶ decode ──┬─▶ response ─▶ sequencer ─▶ caller
//!                                                             └─▶ event ────▶ state / net / dispatcher
//! ```

pub mod agent;
pub mod config;
pub mod diagnostics;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod net;
pub mod observer;
pub mod sequencer;
pub mod state;
pub mod transport;

pub use agent::{DebuggerAgent, Domain, Evaluation};
pub use config::AgentConfig;
pub use diagnostics::Diagnostic;
pub use dispatcher::{EventCallback, EventDispatcher};
pub use error::{AgentError, Result};
pub use events::{AgentEvent, EventBus};
pub use net::{NetAgent, Resource, ResourcePhase};
pub use observer::{AgentObserver, ObserverSet};
pub use sequencer::{CommandSequencer, Remote, RemoteFailure};
pub use state::{AgentState, ShellState};
pub use transport::{ChannelTransport, Transport, WebSocketTransport};
