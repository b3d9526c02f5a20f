//! Live curve ingestion for real-time renderers.
//!
//! Crow receives 3D curves from a streaming server and keeps the latest one
//! ready for a per-frame render loop that must never block.
//!
//! # Pipeline
//!
//! ```text
//! websocket frame ─► decoder ─► ChannelManager ─► CurveStore ─► SampledPathAdapter
//!   (raw deflate)   (JSON)      (supersession)    (snapshot)     (per frame)
//! ```
//!
//! - **Decoder**: raw-deflate JSON `{timestamp, points: [{x, y, z}]}` to [`CurveUpdate`]
//! - **ChannelManager**: one connection per [`ChannelConfig`]; switching channels
//!   retires the old connection so none of its updates land afterwards
//! - **CurveStore**: lock-free latest-curve snapshot
//! - **SampledPathAdapter**: fixed-count samples and tube frames
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use crow::{Crow, CrowConfig, ChannelConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> crow::Result<()> {
//!     let config = CrowConfig::new(ChannelConfig::new("ws://127.0.0.1:8000", 0));
//!     let connection = Crow::connect(&config)?;
//!
//!     // In the render loop:
//!     let points = connection.sample();
//!     println!("{} samples", points.len());
//!
//!     connection.shutdown().await;
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Curve model
pub mod curve;
pub mod decoder;
pub mod sampler;
pub mod store;

// Streaming
pub mod channel;
pub mod config;
pub mod connection;
pub mod stream;
pub mod transport;
pub mod transports;

pub use error::*;
pub use types::*;

pub use channel::{ChannelManager, ChannelOptions, ChannelStats, ReconnectPolicy};
pub use config::{CrowConfig, SamplingConfig};
pub use connection::CurveConnection;
pub use curve::{Curve, CurveKind};
pub use decoder::{decode, encode};
pub use sampler::{Parameterization, PathFrame, SampledPathAdapter, sample};
pub use store::{CurveStore, CurveUpdateSink};
pub use transport::{Subscription, Transport};
pub use transports::{MemoryTransport, WebSocketTransport};

use std::sync::Arc;

/// Entry point for curve connections.
///
/// ```rust,no_run
/// use crow::{Crow, CrowConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> crow::Result<()> {
/// let config = CrowConfig::load("crow.yaml")?;
/// let connection = Crow::connect(&config)?;
/// # Ok(())
/// # }
/// ```
pub struct Crow;

impl Crow {
    /// Connect to the websocket server named in `config`.
    ///
    /// Must be called from within a Tokio runtime. Connection failures do not
    /// surface here; they show up as [`ChannelState::Failed`].
    ///
    /// # Errors
    ///
    /// Returns [`CrowError::Config`] if `config` does not validate.
    pub fn connect(config: &CrowConfig) -> Result<CurveConnection> {
        CurveConnection::connect(Arc::new(WebSocketTransport::new()), config)
    }

    /// Connect through a caller-supplied transport.
    pub fn connect_with(transport: Arc<dyn Transport>, config: &CrowConfig) -> Result<CurveConnection> {
        CurveConnection::connect(transport, config)
    }
}
