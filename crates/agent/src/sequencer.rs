//! Command Sequencer
//!
//! Assigns sequence numbers, remembers which commands are still waiting, and
//! hands each response to the one caller that issued the request.
//!
//! The channel is a single ordered pipe, so correlation is a plain map keyed
//! by sequence number. Commands issued while the backend cannot service them
//! go into an explicit FIFO queue that the agent drains one at a time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use dashmap::DashMap;
use debugger_protocol::{Request, Response, SequenceNumber};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::error::{AgentError, Result};

/// A command the backend rejected (`success: false`)
///
/// This is a normal outcome, e.g. a syntax error in an evaluated expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{command}: {message}")]
pub struct RemoteFailure {
    pub command: String,
    pub message: String,
    pub running: bool,
}

/// Outcome of a command as the backend saw it
pub type Remote<T> = std::result::Result<T, RemoteFailure>;

impl From<&Response> for RemoteFailure {
    fn from(response: &Response) -> Self {
        Self {
            command: response.command.clone(),
            message: response.failure_message(),
            running: response.running,
        }
    }
}

/// Split a response into success or remote failure
pub fn into_remote(response: Response) -> Remote<Response> {
    if response.success {
        Ok(response)
    } else {
        Err(RemoteFailure::from(&response))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("no outstanding request {request_seq} for '{command}'")]
    Unmatched {
        request_seq: SequenceNumber,
        command: String,
    },
}

/// One in-flight request
#[derive(Debug)]
pub struct PendingCommand {
    pub command: String,
    pub issued_at: Instant,
    reply: oneshot::Sender<Response>,
}

/// A command waiting for the backend to become serviceable
pub struct QueuedCommand {
    pub command: String,
    pub arguments: Option<Value>,
    pub reply: oneshot::Sender<Result<Remote<Response>>>,
}

pub struct CommandSequencer {
    /// Monotonic sequence counter, starts at 1
    next_seq: AtomicU64,

    /// Key: request seq, Value: pending command with its reply channel
    pending: DashMap<SequenceNumber, PendingCommand>,

    queue: Mutex<VecDeque<QueuedCommand>>,
    draining: AtomicBool,
}

impl CommandSequencer {
    pub fn new() -> Self {
        Self {
            next_seq: AtomicU64::new(1),
            pending: DashMap::new(),
            queue: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
        }
    }

    pub fn next_sequence_number(&self) -> SequenceNumber {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Register a new outstanding request
    pub fn issue(
        &self,
        command: impl Into<String>,
        arguments: Option<Value>,
    ) -> (Request, oneshot::Receiver<Response>) {
        let seq = self.next_sequence_number();
        let command = command.into();
        let (tx, rx) = oneshot::channel();

        self.pending.insert(
            seq,
            PendingCommand {
                command: command.clone(),
                issued_at: Instant::now(),
                reply: tx,
            },
        );

        let request = Request {
            seq,
            command,
            arguments,
        };
        (request, rx)
    }

    /// Deliver a response to the caller that issued its request
    pub fn complete(&self, response: Response) -> std::result::Result<(), CorrelationError> {
        let Some((_, pending)) = self.pending.remove(&response.request_seq) else {
            return Err(CorrelationError::Unmatched {
                request_seq: response.request_seq,
                command: response.command,
            });
        };

        if !response.command.is_empty() && response.command != pending.command {
            tracing::warn!(
                "Response {} echoes '{}' but request was '{}'",
                response.request_seq,
                response.command,
                pending.command
            );
        }
        tracing::debug!(
            "Request {} '{}' answered in {:?}",
            response.request_seq,
            pending.command,
            pending.issued_at.elapsed()
        );

        let _ = pending.reply.send(response); // Caller may have given up
        Ok(())
    }

    /// Forget an outstanding request
    pub fn cancel(&self, seq: SequenceNumber) -> Option<PendingCommand> {
        self.pending.remove(&seq).map(|(_, pending)| pending)
    }

    /// Drop every outstanding and queued command
    ///
    /// Callers waiting on an issued request see the channel close. Queued
    /// commands are answered with [`AgentError::Closed`]. Returns how many
    /// commands were dropped in total.
    pub fn fail_all(&self) -> usize {
        let outstanding = self.pending.len();
        self.pending.clear();

        let queued: Vec<QueuedCommand> = self.lock_queue().drain(..).collect();
        let count = outstanding + queued.len();
        for command in queued {
            let _ = command.reply.send(Err(AgentError::Closed));
        }
        count
    }

    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Name of the command issued as `seq`, while it is still outstanding
    pub fn pending_command(&self, seq: SequenceNumber) -> Option<String> {
        self.pending.get(&seq).map(|pending| pending.command.clone())
    }

    /// Queue a command for the next drain
    pub fn enqueue(
        &self,
        command: impl Into<String>,
        arguments: Option<Value>,
    ) -> oneshot::Receiver<Result<Remote<Response>>> {
        let (tx, rx) = oneshot::channel();
        self.lock_queue().push_back(QueuedCommand {
            command: command.into(),
            arguments,
            reply: tx,
        });
        rx
    }

    pub fn pop_queued(&self) -> Option<QueuedCommand> {
        self.lock_queue().pop_front()
    }

    pub fn queued(&self) -> usize {
        self.lock_queue().len()
    }

    /// Claim the drain loop. False when another drain is running.
    pub fn try_begin_drain(&self) -> bool {
        self.draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub fn end_drain(&self) {
        self.draining.store(false, Ordering::SeqCst);
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<QueuedCommand>> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for CommandSequencer {
    fn default() -> Self {
        Self::new()
    }
}
