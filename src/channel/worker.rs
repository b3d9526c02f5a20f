//! Connection worker: drives one connection instance through its lifecycle
//!
//! A worker owns the subscription for one generation of the channel manager.
//! It decodes inbound frames and forwards them, tagged with its generation, to
//! the manager's applier. It never touches the curve store itself.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use super::{ChannelOptions, Shared, TaggedUpdate};
use crate::decoder;
use crate::transport::Subscription;
use crate::types::{ChannelConfig, ChannelState};

/// Bound on the close handshake when a connection is cancelled.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// How a single connection attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Superseded or shut down
    Cancelled,
    /// Remote ended the stream after it was open
    RemoteClosed,
    /// Open, handshake or receive failed
    Failed { was_open: bool },
}

pub(super) struct Worker {
    pub(super) generation: u64,
    pub(super) config: ChannelConfig,
    pub(super) options: ChannelOptions,
    pub(super) shared: Arc<Shared>,
    pub(super) updates: mpsc::Sender<TaggedUpdate>,
    pub(super) cancel: CancellationToken,
}

impl Worker {
    /// Run connection attempts until cancelled or the reconnect policy gives up.
    pub(super) async fn run(self) {
        let uri = self.config.uri();
        info!(generation = self.generation, %uri, "Connection worker started");
        let mut failures = 0u32;

        loop {
            self.set_state(ChannelState::Connecting);
            self.shared.stats.record_attempt();

            let end = self.session(&uri).await;
            match end {
                SessionEnd::Cancelled => {
                    self.set_state(ChannelState::Closed);
                    break;
                }
                SessionEnd::RemoteClosed => self.set_state(ChannelState::Closed),
                SessionEnd::Failed { .. } => self.set_state(ChannelState::Failed),
            }

            if matches!(end, SessionEnd::RemoteClosed | SessionEnd::Failed { was_open: true }) {
                failures = 0;
            }
            failures += 1;

            let Some(delay) = self.options.reconnect.delay_for(failures) else {
                debug!(generation = self.generation, %uri, "Not reconnecting");
                break;
            };

            info!(generation = self.generation, %uri, attempt = failures, ?delay, "Reconnecting after delay");
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.set_state(ChannelState::Closed);
                    break;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!(generation = self.generation, %uri, "Connection worker ended");
    }

    /// One connection instance: open, greet, receive until something ends it.
    async fn session(&self, uri: &str) -> SessionEnd {
        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return SessionEnd::Cancelled,
            result = tokio::time::timeout(self.options.connect_timeout, self.shared.transport.open(uri)) => result,
        };

        let mut subscription = match opened {
            Ok(Ok(subscription)) => subscription,
            Ok(Err(e)) => {
                error!(generation = self.generation, %uri, "Connection failed: {}", e);
                return SessionEnd::Failed { was_open: false };
            }
            Err(_) => {
                error!(
                    generation = self.generation,
                    %uri,
                    timeout = ?self.options.connect_timeout,
                    "Connection timed out"
                );
                return SessionEnd::Failed { was_open: false };
            }
        };

        let greeted = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                close(subscription.as_mut()).await;
                return SessionEnd::Cancelled;
            }
            result = subscription.send_text(&self.options.greeting) => result,
        };
        if let Err(e) = greeted {
            error!(generation = self.generation, %uri, "Handshake failed: {}", e);
            return SessionEnd::Failed { was_open: false };
        }

        self.set_state(ChannelState::Open);
        let mut received = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(generation = self.generation, %uri, received, "Closing superseded connection");
                    close(subscription.as_mut()).await;
                    return SessionEnd::Cancelled;
                }
                next = subscription.next_message() => next,
            };

            match next {
                Ok(Some(payload)) => {
                    received += 1;
                    self.shared.stats.record_message();
                    if !self.forward(&payload, received).await {
                        debug!(generation = self.generation, %uri, received, "Cancelled while queueing update");
                        close(subscription.as_mut()).await;
                        return SessionEnd::Cancelled;
                    }
                }
                Ok(None) => {
                    info!(generation = self.generation, %uri, received, "Stream closed by remote");
                    return SessionEnd::RemoteClosed;
                }
                Err(e) => {
                    error!(generation = self.generation, %uri, received, "Stream broke: {}", e);
                    return SessionEnd::Failed { was_open: true };
                }
            }
        }
    }

    /// Decode one payload and hand it to the applier; bad frames are dropped.
    ///
    /// Waits for room when the applier queue is full, so a slow sink slows
    /// reads instead of growing memory. Returns `false` if cancelled while
    /// waiting.
    async fn forward(&self, payload: &[u8], sequence: u64) -> bool {
        match decoder::decode(payload) {
            Ok(update) => {
                trace!(
                    generation = self.generation,
                    sequence,
                    timestamp = update.timestamp,
                    points = update.points.len(),
                    "Decoded update"
                );
                let tagged = TaggedUpdate { generation: self.generation, update };
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return false,
                    sent = self.updates.send(tagged) => {
                        if sent.is_err() {
                            debug!(generation = self.generation, "Applier gone, dropping update");
                        }
                    }
                }
            }
            Err(e) => {
                self.shared.stats.record_decode_failure();
                warn!(
                    generation = self.generation,
                    sequence,
                    bytes = payload.len(),
                    "Dropped undecodable frame: {}",
                    e
                );
            }
        }
        true
    }

    /// Publish a state transition if this worker is still the current one.
    ///
    /// Once cancelled, only `Closed` is recorded.
    fn set_state(&self, state: ChannelState) {
        if self.cancel.is_cancelled() && state != ChannelState::Closed {
            return;
        }
        if self.shared.publish_state(self.generation, state) {
            debug!(generation = self.generation, %state, "Channel state changed");
        } else {
            trace!(generation = self.generation, %state, "Retired connection state change");
        }
    }
}

async fn close(subscription: &mut dyn Subscription) {
    if tokio::time::timeout(CLOSE_TIMEOUT, subscription.close()).await.is_err() {
        trace!("Close handshake timed out");
    }
}
