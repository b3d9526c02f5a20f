//! Live curve connection: store, channel manager and sampler wired together

use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::channel::{ChannelManager, ChannelStats};
use crate::config::CrowConfig;
use crate::curve::Curve;
use crate::sampler::{PathFrame, SampledPathAdapter};
use crate::store::CurveStore;
use crate::transport::Transport;
use crate::types::{ChannelConfig, ChannelState, Point3, UpdateRate};
use crate::{CrowError, Result};

/// Everything a render loop needs from one streaming channel.
///
/// The render side only calls [`curve`](Self::curve) / [`sample`](Self::sample),
/// which never block. Control surfaces call [`configure`](Self::configure) to
/// switch channels.
pub struct CurveConnection {
    store: Arc<CurveStore>,
    manager: ChannelManager,
    sampler: SampledPathAdapter,
    sample_count: usize,
}

impl CurveConnection {
    /// Build the pipeline for `config` and start connecting.
    ///
    /// Returns as soon as the connection is being established; the curve is
    /// `None` until the first update arrives.
    pub fn connect(transport: Arc<dyn Transport>, config: &CrowConfig) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(CurveStore::with_kind(config.curve_kind));
        let manager = ChannelManager::spawn(transport, store.clone(), config.channel_options());
        manager.configure(config.channel.clone());

        info!(channel = %config.channel, kind = ?config.curve_kind, "Curve connection started");
        Ok(Self { store, manager, sampler: config.sampler(), sample_count: config.sampling.count })
    }

    /// Latest curve, if any. Never blocks.
    pub fn curve(&self) -> Option<Arc<Curve>> {
        self.store.get()
    }

    /// Sample the latest curve with the configured count. Empty before the
    /// first update.
    pub fn sample(&self) -> Vec<Point3> {
        self.sample_with(self.sample_count)
    }

    pub fn sample_with(&self, count: usize) -> Vec<Point3> {
        self.curve().map(|curve| self.sampler.sample(&curve, count)).unwrap_or_default()
    }

    /// Tube frames for the latest curve with the configured count.
    pub fn sample_frames(&self) -> Vec<PathFrame> {
        self.curve()
            .map(|curve| self.sampler.sample_frames(&curve, self.sample_count))
            .unwrap_or_default()
    }

    /// Published curves, throttled to `rate`.
    pub fn subscribe(&self, rate: UpdateRate) -> impl Stream<Item = Arc<Curve>> + Send + 'static {
        self.store.subscribe(rate)
    }

    /// Wait for the first curve (or the current one, if already present).
    pub async fn wait_for_curve(&self, timeout: Duration) -> Result<Arc<Curve>> {
        let mut curves = self.store.subscribe(UpdateRate::Native);
        match tokio::time::timeout(timeout, curves.next()).await {
            Ok(Some(curve)) => Ok(curve),
            Ok(None) => Err(CrowError::connection_failed("curve stream ended")),
            Err(_) => Err(CrowError::Timeout { duration: timeout }),
        }
    }

    /// Switch to another channel. See [`ChannelManager::configure`].
    pub fn configure(&self, config: ChannelConfig) {
        self.manager.configure(config);
    }

    pub fn state(&self) -> ChannelState {
        self.manager.current_state()
    }

    pub fn watch_state(&self) -> impl Stream<Item = ChannelState> + Send + 'static {
        self.manager.watch_state()
    }

    pub fn stats(&self) -> ChannelStats {
        self.manager.stats()
    }

    pub fn store(&self) -> &Arc<CurveStore> {
        &self.store
    }

    pub fn manager(&self) -> &ChannelManager {
        &self.manager
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Close the channel and wait for its task. The last curve stays readable.
    pub async fn shutdown(&self) {
        debug!("Shutting down curve connection");
        self.manager.shutdown().await;
    }
}
