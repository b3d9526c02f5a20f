//! Websocket transport backed by tokio-tungstenite

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use crate::transport::{Subscription, Transport};
use crate::{CrowError, Result};

/// Opens websocket subscriptions (`ws://` URIs).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, uri: &str) -> Result<Box<dyn Subscription>> {
        debug!(uri, "Opening websocket");
        let (stream, response) = connect_async(uri)
            .await
            .map_err(|e| CrowError::connection_to(uri, "websocket handshake failed", Some(Box::new(e))))?;

        info!(uri, status = %response.status(), "Websocket connected");
        Ok(Box::new(WebSocketSubscription { uri: uri.to_string(), stream }))
    }
}

struct WebSocketSubscription {
    uri: String,
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait::async_trait]
impl Subscription for WebSocketSubscription {
    async fn send_text(&mut self, text: &str) -> Result<()> {
        self.stream
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| CrowError::connection_to(&self.uri, "send failed", Some(Box::new(e))))
    }

    async fn next_message(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(message) = self.stream.next().await {
            let message = message
                .map_err(|e| CrowError::connection_to(&self.uri, "receive failed", Some(Box::new(e))))?;
            match message {
                Message::Binary(data) => return Ok(Some(data)),
                Message::Close(frame) => {
                    debug!(uri = %self.uri, ?frame, "Websocket closed by remote");
                    return Ok(None);
                }
                Message::Text(text) => warn!(uri = %self.uri, len = text.len(), "Ignored text frame"),
                Message::Ping(data) => trace!(uri = %self.uri, len = data.len(), "Ping"),
                Message::Pong(data) => trace!(uri = %self.uri, len = data.len(), "Ignored pong"),
                Message::Frame(_) => trace!(uri = %self.uri, "Ignored raw frame"),
            }
        }
        Ok(None)
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            trace!(uri = %self.uri, "Close handshake error: {}", e);
        }
    }
}
