//! Transport traits: the seam between the channel manager and the network

use crate::Result;

/// Opens streaming subscriptions.
///
/// Transports abstract over the concrete network stack (websocket, in-memory
/// test doubles). The channel manager only ever talks to these two traits.
#[async_trait::async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a subscription to `uri`.
    ///
    /// Returns:
    /// - `Ok(subscription)` - Connection established, ready for the handshake
    /// - `Err(e)` - Open failed or the remote rejected the connection
    async fn open(&self, uri: &str) -> Result<Box<dyn Subscription>>;
}

/// One open streaming connection.
#[async_trait::async_trait]
pub trait Subscription: Send + 'static {
    /// Send a text message (used for the handshake greeting).
    async fn send_text(&mut self, text: &str) -> Result<()>;

    /// Receive the next binary payload.
    ///
    /// Returns:
    /// - `Ok(Some(bytes))` - One data frame
    /// - `Ok(None)` - The remote closed the stream (normal termination)
    /// - `Err(e)` - Abrupt close or protocol error
    ///
    /// Control and text frames are consumed internally and never returned.
    async fn next_message(&mut self) -> Result<Option<Vec<u8>>>;

    /// Close the connection. Errors are not interesting at this point.
    async fn close(&mut self);
}
