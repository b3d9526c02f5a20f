//! Channel manager: one logical streaming connection at a time
//!
//! The manager owns the current connection instance and its state. Each
//! instance runs as its own task (see [`worker`]) and hands decoded updates to
//! a single applier task over a bounded mpsc queue. The applier is the only caller of
//! [`CurveUpdateSink::accept`].
//!
//! Supersession is enforced by a generation counter. `configure` and
//! `shutdown` bump it under the same lock the applier holds while delivering
//! an update, so once either call returns no update from a retired instance
//! can reach the sink.

use futures::Stream;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::store::CurveUpdateSink;
use crate::transport::Transport;
use crate::types::{ChannelConfig, ChannelState, CurveUpdate};

mod reconnect;
mod worker;


pub use reconnect::ReconnectPolicy;

use worker::Worker;

/// Greeting sent once a connection opens.
pub const DEFAULT_GREETING: &str = "Hello, Server";

/// Decoded updates waiting for the applier. Workers wait for room when full.
pub const UPDATE_QUEUE_CAPACITY: usize = 64;

/// Upper bound on how long `shutdown` waits for the worker to wind down.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-manager connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelOptions {
    /// Text sent to the server right after the connection opens
    pub greeting: String,
    /// Bound on establishing a connection
    pub connect_timeout: Duration,
    /// What to do after an unsolicited close or failure
    pub reconnect: ReconnectPolicy,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            connect_timeout: Duration::from_secs(5),
            reconnect: ReconnectPolicy::Never,
        }
    }
}

/// Counters since the manager was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub messages_received: u64,
    pub updates_applied: u64,
    pub decode_failures: u64,
    /// Updates that arrived from a superseded connection and were discarded
    pub stale_dropped: u64,
    pub connection_attempts: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    messages_received: AtomicU64,
    updates_applied: AtomicU64,
    decode_failures: AtomicU64,
    stale_dropped: AtomicU64,
    connection_attempts: AtomicU64,
}

impl StatsCounters {
    fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    fn record_applied(&self) {
        self.updates_applied.fetch_add(1, Ordering::Relaxed);
    }

    fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_stale(&self) {
        self.stale_dropped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_attempt(&self) {
        self.connection_attempts.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ChannelStats {
        ChannelStats {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            stale_dropped: self.stale_dropped.load(Ordering::Relaxed),
            connection_attempts: self.connection_attempts.load(Ordering::Relaxed),
        }
    }
}

/// Decoded update stamped with the generation of the instance that received it.
#[derive(Debug)]
struct TaggedUpdate {
    generation: u64,
    update: CurveUpdate,
}

/// State shared between the manager, its workers and the applier.
struct Shared {
    transport: Arc<dyn Transport>,
    sink: Arc<dyn CurveUpdateSink>,
    /// Current generation. Held while delivering to the sink and while
    /// publishing state, so both are ordered against supersession.
    gate: Mutex<u64>,
    state: watch::Sender<ChannelState>,
    stats: StatsCounters,
}

impl Shared {
    fn gate(&self) -> MutexGuard<'_, u64> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish `state` on behalf of `generation`. Returns `false` if that
    /// generation has been retired.
    fn publish_state(&self, generation: u64, state: ChannelState) -> bool {
        let gate = self.gate();
        if *gate != generation {
            return false;
        }
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
        true
    }

    /// Retire the current generation and publish `state` for the new one.
    fn advance(&self, state: ChannelState) -> u64 {
        let mut gate = self.gate();
        *gate += 1;
        self.state.send_replace(state);
        *gate
    }
}

/// Deliver one update to the sink if its generation is still current.
fn apply(shared: &Shared, tagged: TaggedUpdate) {
    let gate = shared.gate();
    if *gate == tagged.generation {
        shared.sink.accept(tagged.update);
        shared.stats.record_applied();
    } else {
        shared.stats.record_stale();
        trace!(
            generation = tagged.generation,
            current = *gate,
            timestamp = tagged.update.timestamp,
            "Dropped update from superseded connection"
        );
    }
}

struct ActiveConnection {
    config: ChannelConfig,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns at most one live connection and routes its updates to a sink.
///
/// Construction and `configure` spawn tasks, so both must run inside a Tokio
/// runtime.
///
/// ```rust,no_run
/// use crow::{ChannelConfig, ChannelManager, ChannelOptions, CurveStore, WebSocketTransport};
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let store = Arc::new(CurveStore::new());
/// let manager = ChannelManager::spawn(
///     Arc::new(WebSocketTransport::new()),
///     store.clone(),
///     ChannelOptions::default(),
/// );
/// manager.configure(ChannelConfig::new("ws://127.0.0.1:8000", 0));
/// // ... later, switch channels; nothing from channel 0 lands after this returns
/// manager.configure(ChannelConfig::new("ws://127.0.0.1:8000", 1));
/// manager.shutdown().await;
/// # }
/// ```
pub struct ChannelManager {
    shared: Arc<Shared>,
    options: ChannelOptions,
    updates: mpsc::Sender<TaggedUpdate>,
    active: Mutex<Option<ActiveConnection>>,
    cancel: CancellationToken,
}

impl ChannelManager {
    /// Create a manager and spawn its applier task. No connection is opened
    /// until [`configure`](Self::configure) is called.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        sink: Arc<dyn CurveUpdateSink>,
        options: ChannelOptions,
    ) -> Self {
        let (state, _) = watch::channel(ChannelState::Closed);
        let shared = Arc::new(Shared {
            transport,
            sink,
            gate: Mutex::new(0),
            state,
            stats: StatsCounters::default(),
        });

        let (updates, mut queue) = mpsc::channel::<TaggedUpdate>(UPDATE_QUEUE_CAPACITY);
        let cancel = CancellationToken::new();

        let applier_shared = Arc::clone(&shared);
        let applier_cancel = cancel.clone();
        tokio::spawn(async move {
            debug!("Update applier started");
            loop {
                let tagged = tokio::select! {
                    _ = applier_cancel.cancelled() => break,
                    tagged = queue.recv() => tagged,
                };
                let Some(tagged) = tagged else { break };
                apply(&applier_shared, tagged);
            }
            debug!("Update applier stopped");
        });

        Self { shared, options, updates, active: Mutex::new(None), cancel }
    }

    /// Point the manager at `config`.
    ///
    /// A different config supersedes the current connection: it is cancelled,
    /// its queued updates are discarded and a new connection starts in
    /// `Connecting`. The same config is a no-op unless the current connection
    /// has ended for good (`Closed`/`Failed` with no reconnect pending), in
    /// which case it is restarted.
    pub fn configure(&self, config: ChannelConfig) {
        let mut active = self.active();

        if let Some(current) = active.as_ref() {
            if current.config == config {
                let state = self.current_state();
                let ended = state.is_terminal()
                    && (current.task.is_finished() || !self.options.reconnect.is_enabled());
                if !ended {
                    trace!(%config, %state, "Configure with unchanged config ignored");
                    return;
                }
                info!(%config, %state, "Restarting ended connection");
            }
        }

        let generation = self.shared.advance(ChannelState::Connecting);

        if let Some(previous) = active.take() {
            debug!(config = %previous.config, "Closing superseded connection");
            previous.cancel.cancel();
        }

        info!(%config, generation, "Connecting channel");
        let cancel = self.cancel.child_token();
        let worker = Worker {
            generation,
            config: config.clone(),
            options: self.options.clone(),
            shared: Arc::clone(&self.shared),
            updates: self.updates.clone(),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(worker.run());

        *active = Some(ActiveConnection { config, cancel, task });
    }

    /// Cancel the current connection and wait for it to wind down.
    ///
    /// Afterwards the state is `Closed` and a later `configure` opens a fresh
    /// connection.
    pub async fn shutdown(&self) {
        let previous = {
            let mut active = self.active();
            let previous = active.take();
            if previous.is_some() {
                self.shared.advance(ChannelState::Closing);
            }
            previous
        };

        let Some(previous) = previous else {
            trace!("Shutdown with no active connection");
            return;
        };

        info!(config = %previous.config, "Shutting down channel");
        previous.cancel.cancel();
        match tokio::time::timeout(SHUTDOWN_TIMEOUT, previous.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Connection task ended abnormally: {}", e),
            Err(_) => warn!(timeout = ?SHUTDOWN_TIMEOUT, "Connection task did not stop in time"),
        }

        // A configure may have raced in while we were waiting; leave its state alone.
        let active = self.active();
        if active.is_none() {
            let generation = *self.shared.gate();
            self.shared.publish_state(generation, ChannelState::Closed);
        }
    }

    /// State of the current connection, `Closed` when none is configured.
    pub fn current_state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    pub fn current_config(&self) -> Option<ChannelConfig> {
        self.active().as_ref().map(|active| active.config.clone())
    }

    /// Stream of state changes, starting with the current state.
    pub fn watch_state(&self) -> impl Stream<Item = ChannelState> + Send + 'static {
        WatchStream::new(self.shared.state.subscribe())
    }

    pub fn stats(&self) -> ChannelStats {
        self.shared.stats.snapshot()
    }

    pub fn options(&self) -> &ChannelOptions {
        &self.options
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveConnection>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ChannelManager {
    fn drop(&mut self) {
        debug!("Dropping channel manager");
        self.cancel.cancel();
    }
}
