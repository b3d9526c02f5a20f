//! Core value types for curve ingestion.
//!
//! - [`Point3`] is a control point / sample position
//! - [`CurveUpdate`] is one decoded wire message
//! - [`ChannelConfig`] addresses a logical stream, [`ChannelState`] tracks a
//!   connection instance
//! - [`UpdateRate`] controls subscription throttling
//!
//! ```rust
//! use crow::types::{ChannelConfig, CurveUpdate, Point3};
//!
//! let update = CurveUpdate::new(1, vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)]);
//! assert!(!update.is_degenerate());
//!
//! let cfg = ChannelConfig::new("ws://127.0.0.1:8000", 2);
//! assert_eq!(cfg.uri(), "ws://127.0.0.1:8000/down/2");
//! ```

mod channel;
mod point;
mod update;
mod update_rate;

pub use channel::{ChannelConfig, ChannelState};
pub use point::Point3;
pub use update::CurveUpdate;
pub use update_rate::UpdateRate;
