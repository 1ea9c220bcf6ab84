//! In-process transport over tokio channels
//!
//! Used when the backend lives in the same process (a native binding that
//! exchanges strings) and by tests, which play the backend on the other end.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::Transport;
use crate::error::{AgentError, Result};

pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<String>,
    /// Message sent by `yield_to_remote`, if the backend needs one
    nudge: Option<String>,
    closed: AtomicBool,
}

impl ChannelTransport {
    /// Create a transport and the receiver the backend reads from
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            outbound: tx,
            nudge: None,
            closed: AtomicBool::new(false),
        };
        (transport, rx)
    }

    pub fn with_nudge(mut self, nudge: impl Into<String>) -> Self {
        self.nudge = Some(nudge.into());
        self
    }

    fn push(&self, message: String) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AgentError::Closed);
        }
        self.outbound
            .send(message)
            .map_err(|_| AgentError::Transport("backend receiver dropped".to_string()))
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send_raw(&self, message: String) -> Result<()> {
        self.push(message)
    }

    async fn yield_to_remote(&self) -> Result<()> {
        match &self.nudge {
            Some(nudge) => self.push(nudge.clone()),
            None => Ok(()),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_and_nudge() {
        let (transport, mut rx) = ChannelTransport::new();
        let transport = transport.with_nudge("nudge");

        transport.send_raw("hello".to_string()).await.unwrap();
        transport.yield_to_remote().await.unwrap();

        assert_eq!(rx.recv().await.unwrap(), "hello");
        assert_eq!(rx.recv().await.unwrap(), "nudge");
    }

    #[tokio::test]
    async fn test_closed_transport_rejects_sends() {
        let (transport, _rx) = ChannelTransport::new();
        transport.close().await.unwrap();

        let result = transport.send_raw("late".to_string()).await;
        tokio_test::assert_err!(result);
    }

    #[tokio::test]
    async fn test_dropped_backend() {
        let (transport, rx) = ChannelTransport::new();
        drop(rx);

        match transport.send_raw("x".to_string()).await {
            Err(AgentError::Transport(_)) => {}
            other => panic!("Expected transport error, got {:?}", other),
        }
    }
}
