//! WebSocket transport
//!
//! Design decisions:
//! 1. One WebSocket per debugging session
//! 2. The reader task only forwards text frames; decoding happens in the agent
//! 3. Fail fast - no reconnects, no retries. Let the caller decide.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::Transport;
use crate::error::Result;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

pub struct WebSocketTransport {
    /// WebSocket write half (wrapped for concurrent sending)
    ws_sink: Arc<RwLock<WsSink>>,
    nudge: Option<String>,
    reader: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Connect and start forwarding inbound text frames
    ///
    /// The returned receiver yields every text message in arrival order and
    /// closes when the socket does.
    pub async fn connect(endpoint: &Url) -> Result<(Self, mpsc::UnboundedReceiver<String>)> {
        let (ws_stream, _) = connect_async(endpoint.as_str()).await?;
        let (sink, mut stream) = ws_stream.split();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text).is_err() {
                            tracing::debug!("Inbound receiver dropped, stopping reader");
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        tracing::info!("Connected to debugger backend at {}", endpoint);
        let transport = Self {
            ws_sink: Arc::new(RwLock::new(sink)),
            nudge: None,
            reader,
        };
        Ok((transport, inbound_rx))
    }

    /// Text frame sent by `yield_to_remote`
    pub fn with_nudge(mut self, nudge: impl Into<String>) -> Self {
        self.nudge = Some(nudge.into());
        self
    }

    async fn send_text(&self, text: String) -> Result<()> {
        let mut sink = self.ws_sink.write().await;
        sink.send(Message::Text(text)).await?;
        Ok(())
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send_raw(&self, message: String) -> Result<()> {
        self.send_text(message).await
    }

    async fn yield_to_remote(&self) -> Result<()> {
        match &self.nudge {
            Some(nudge) => self.send_text(nudge.clone()).await,
            None => Ok(()),
        }
    }

    async fn close(&self) -> Result<()> {
        let mut sink = self.ws_sink.write().await;
        sink.close().await?;
        Ok(())
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
