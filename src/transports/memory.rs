//! In-process transport for tests and demos.
//!
//! Every `open` creates a [`MemoryPeer`] that plays the server side of the
//! connection: it can push payloads, close the stream or break it with an
//! error at any moment, including after the client has moved on to another
//! channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, trace};

use crate::decoder;
use crate::transport::{Subscription, Transport};
use crate::types::CurveUpdate;
use crate::{CrowError, Result};

#[derive(Debug)]
enum PeerEvent {
    Message(Vec<u8>),
    Close,
    Error(String),
}

#[derive(Debug, Default)]
struct PeerShared {
    greetings: Mutex<Vec<String>>,
    closed_by_client: AtomicBool,
}

/// Server side of one in-memory connection.
#[derive(Debug, Clone)]
pub struct MemoryPeer {
    uri: String,
    events: mpsc::UnboundedSender<PeerEvent>,
    shared: Arc<PeerShared>,
}

impl MemoryPeer {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Push a raw binary payload. Returns `false` once the client side is gone.
    pub fn send(&self, payload: Vec<u8>) -> bool {
        self.events.send(PeerEvent::Message(payload)).is_ok()
    }

    /// Encode and push a curve update.
    pub fn send_update(&self, update: &CurveUpdate) -> bool {
        match decoder::encode(update) {
            Ok(payload) => self.send(payload),
            Err(_) => false,
        }
    }

    /// End the stream cleanly from the server side.
    pub fn close(&self) {
        let _ = self.events.send(PeerEvent::Close);
    }

    /// Break the stream with a protocol error.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.events.send(PeerEvent::Error(reason.into()));
    }

    /// Text messages the client sent on this connection.
    pub fn greetings(&self) -> Vec<String> {
        lock(&self.shared.greetings).clone()
    }

    /// Whether the client closed (or dropped) its end.
    pub fn is_closed_by_client(&self) -> bool {
        self.shared.closed_by_client.load(Ordering::Acquire) || self.events.is_closed()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    peers: HashMap<String, Vec<MemoryPeer>>,
    refusals: HashMap<String, String>,
    open_delay: Option<Duration>,
}

/// Transport whose connections live entirely in process.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
    opened: Arc<Notify>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make future opens of `uri` fail with `reason`.
    pub fn refuse(&self, uri: impl Into<String>, reason: impl Into<String>) {
        lock(&self.state).refusals.insert(uri.into(), reason.into());
    }

    /// Undo [`refuse`](Self::refuse).
    pub fn allow(&self, uri: &str) {
        lock(&self.state).refusals.remove(uri);
    }

    /// Delay every open by `delay` (to exercise connect timeouts).
    pub fn set_open_delay(&self, delay: Option<Duration>) {
        lock(&self.state).open_delay = delay;
    }

    /// Number of successful opens of `uri` so far.
    pub fn open_count(&self, uri: &str) -> usize {
        lock(&self.state).peers.get(uri).map_or(0, Vec::len)
    }

    /// Most recent connection to `uri`, if any.
    pub fn peer(&self, uri: &str) -> Option<MemoryPeer> {
        lock(&self.state).peers.get(uri).and_then(|peers| peers.last().cloned())
    }

    /// Wait until `uri` has been opened at least `count` times and return the
    /// latest connection.
    pub async fn wait_for_open(&self, uri: &str, count: usize) -> MemoryPeer {
        loop {
            let notified = self.opened.notified();
            {
                let state = lock(&self.state);
                if let Some(peers) = state.peers.get(uri) {
                    if peers.len() >= count {
                        if let Some(peer) = peers.last() {
                            return peer.clone();
                        }
                    }
                }
            }
            notified.await;
        }
    }
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    async fn open(&self, uri: &str) -> Result<Box<dyn Subscription>> {
        let delay = lock(&self.state).open_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(PeerShared::default());
        {
            let mut state = lock(&self.state);
            if let Some(reason) = state.refusals.get(uri) {
                debug!(uri, "Memory transport refusing open");
                return Err(CrowError::connection_to(uri, reason.clone(), None));
            }
            let peer = MemoryPeer { uri: uri.to_string(), events: tx, shared: Arc::clone(&shared) };
            state.peers.entry(uri.to_string()).or_default().push(peer);
        }
        self.opened.notify_waiters();

        trace!(uri, "Memory connection opened");
        Ok(Box::new(MemorySubscription { uri: uri.to_string(), events: rx, shared }))
    }
}

struct MemorySubscription {
    uri: String,
    events: mpsc::UnboundedReceiver<PeerEvent>,
    shared: Arc<PeerShared>,
}

#[async_trait::async_trait]
impl Subscription for MemorySubscription {
    async fn send_text(&mut self, text: &str) -> Result<()> {
        if self.shared.closed_by_client.load(Ordering::Acquire) {
            return Err(CrowError::connection_to(&self.uri, "send after close", None));
        }
        lock(&self.shared.greetings).push(text.to_string());
        Ok(())
    }

    async fn next_message(&mut self) -> Result<Option<Vec<u8>>> {
        match self.events.recv().await {
            Some(PeerEvent::Message(payload)) => Ok(Some(payload)),
            Some(PeerEvent::Close) | None => Ok(None),
            Some(PeerEvent::Error(reason)) => Err(CrowError::connection_to(&self.uri, reason, None)),
        }
    }

    async fn close(&mut self) {
        self.shared.closed_by_client.store(true, Ordering::Release);
        self.events.close();
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.shared.closed_by_client.store(true, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
