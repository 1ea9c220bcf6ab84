//! Break/run state machine and UI-facing shell state
//!
//! ```text
//!            break / exception event
//!   Running ─────────────────────────▶ Broken
//!      ▲                                  │
//!      └──────────────────────────────────┘
//!        continue response, running == true
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Externally observable debugger state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AgentState {
    #[default]
    Running,
    Broken,
}

impl AgentState {
    pub fn is_broken(&self) -> bool {
        matches!(self, AgentState::Broken)
    }
}

/// Commands whose response may resume execution
pub fn is_continue_class(command: &str) -> bool {
    command == "continue"
}

/// Holds the current state and publishes every change
pub struct BreakRunMachine {
    tx: watch::Sender<AgentState>,
}

impl BreakRunMachine {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AgentState::Running);
        Self { tx }
    }

    pub fn current(&self) -> AgentState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AgentState> {
        self.tx.subscribe()
    }

    /// Move to `next`. Returns true when the state actually changed.
    pub fn transition(&self, next: AgentState) -> bool {
        self.tx.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            *state = next;
            true
        })
    }

    pub fn on_break(&self) -> bool {
        self.transition(AgentState::Broken)
    }

    /// Apply a response. Only continue-class commands that report
    /// `running == true` resume execution.
    pub fn on_response(&self, command: &str, running: bool) -> bool {
        if is_continue_class(command) && running {
            self.transition(AgentState::Running)
        } else {
            false
        }
    }
}

impl Default for BreakRunMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// UI-facing shell state driven by custom events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShellState {
    /// Set by `setDebuggerBreak`: break at the next statement
    pub debugger_break: bool,
    /// Lines appended through `appendText`
    pub output: Vec<String>,
    pub command_line_focused: bool,
    /// Input affordances are only enabled while broken
    pub input_enabled: bool,
    pub attached: bool,
}
