//! Latest-curve store shared between the network side and the render loop.
//!
//! The store holds one immutable [`Curve`] snapshot behind an atomically
//! swapped pointer. Readers (`get`) never block and never see a curve under
//! construction: a new curve is fully built before it is published, and the
//! previous one is freed once the last reader drops its `Arc`.

use arc_swap::ArcSwapOption;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::trace;

use crate::curve::{Curve, CurveKind};
use crate::stream::ThrottleExt;
use crate::types::{CurveUpdate, UpdateRate};

/// Receiver of accepted curve updates.
///
/// The channel manager is written against this capability rather than a
/// concrete store, so tests and embedders can observe the update flow.
pub trait CurveUpdateSink: Send + Sync + 'static {
    fn accept(&self, update: CurveUpdate);
}

/// Process-wide holder of the latest known curve.
pub struct CurveStore {
    current: ArcSwapOption<Curve>,
    version: AtomicU64,
    kind: CurveKind,
    published: watch::Sender<Option<Arc<Curve>>>,
}

impl Default for CurveStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CurveStore {
    /// Empty store building centripetal curves.
    pub fn new() -> Self {
        Self::with_kind(CurveKind::default())
    }

    /// Empty store building curves of the given flavour.
    pub fn with_kind(kind: CurveKind) -> Self {
        let (published, _) = watch::channel(None);
        Self { current: ArcSwapOption::empty(), version: AtomicU64::new(0), kind, published }
    }

    /// Build a curve from `update` and publish it. Returns the new version.
    pub fn set(&self, update: CurveUpdate) -> u64 {
        let point_count = update.points.len();
        let timestamp = update.timestamp;
        let curve = Arc::new(Curve::from_update(update, self.kind));

        self.current.store(Some(Arc::clone(&curve)));
        let version = self.version.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        self.published.send_replace(Some(curve));

        trace!(version, timestamp, points = point_count, "Curve published");
        version
    }

    /// Latest published curve, or `None` before the first update.
    pub fn get(&self) -> Option<Arc<Curve>> {
        self.current.load_full()
    }

    /// Number of curves published so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Flavour of the curves this store builds
    pub fn kind(&self) -> CurveKind {
        self.kind
    }

    /// Stream of published curves.
    ///
    /// Yields the current curve immediately (if any), then each new one.
    /// Consumers that fall behind only see the latest curve.
    pub fn subscribe(&self, rate: UpdateRate) -> BoxStream<'static, Arc<Curve>> {
        let curves = WatchStream::new(self.published.subscribe()).filter_map(|opt| async move { opt });

        match rate.throttle_interval() {
            None => curves.boxed(),
            Some(interval) => curves.throttle(interval).boxed(),
        }
    }
}

impl CurveUpdateSink for CurveStore {
    fn accept(&self, update: CurveUpdate) {
        self.set(update);
    }
}
