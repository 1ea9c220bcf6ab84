//! Transport - the opaque string channel to the backend
//!
//! Core principle: the agent only ever hands over whole JSON strings and
//! receives whole JSON strings back, in order. How they travel is the
//! transport's business.

pub mod channel;
pub mod websocket;

use async_trait::async_trait;

use crate::error::Result;

pub use channel::ChannelTransport;
pub use websocket::WebSocketTransport;

/// Outbound half of a connection to a debugging backend
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one complete message
    async fn send_raw(&self, message: String) -> Result<()>;

    /// Make sure the remote side services its inbound queue
    ///
    /// Some backends only look at queued commands when the debuggee hands
    /// control back. Transports that talk to such a backend nudge it here.
    /// The default does nothing.
    async fn yield_to_remote(&self) -> Result<()> {
        Ok(())
    }

    /// Close the connection
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
