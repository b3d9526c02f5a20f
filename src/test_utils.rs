//! Fixtures shared by unit tests, integration tests and benches.
//!
//! Curves here mirror what the reference streaming service produces: a short
//! diagonal polyline for smoke tests plus a helix large enough to make the
//! decoder and sampler do real work.

#![cfg(any(test, feature = "benchmark"))]

use crate::decoder;
use crate::types::{ChannelConfig, CurveUpdate, Point3};

/// Base URL used with the in-memory transport.
pub const MEMORY_SERVER: &str = "mem://crow";

/// Channel config on the in-memory server.
pub fn memory_channel(channel_id: u32) -> ChannelConfig {
    ChannelConfig::new(MEMORY_SERVER, channel_id)
}

/// Update built from plain tuples.
pub fn update(timestamp: u64, points: &[(f64, f64, f64)]) -> CurveUpdate {
    CurveUpdate::new(timestamp, points.iter().copied().map(Point3::from).collect())
}

/// Points `(i, i, i)` for `i` in `1..count+1`, the shape the mock server sends.
pub fn diagonal_update(timestamp: u64, count: usize) -> CurveUpdate {
    let points = (1..=count)
        .map(|i| {
            let v = i as f64;
            Point3::new(v, v, v)
        })
        .collect();
    CurveUpdate::new(timestamp, points)
}

/// Helix around the z axis with `count` control points over `turns` turns.
pub fn helix_update(timestamp: u64, count: usize, turns: f64) -> CurveUpdate {
    let steps = count.saturating_sub(1).max(1) as f64;
    let points = (0..count)
        .map(|i| {
            let t = i as f64 / steps;
            let angle = t * turns * std::f64::consts::TAU;
            Point3::new(angle.cos() * 5.0, angle.sin() * 5.0, t * 10.0)
        })
        .collect();
    CurveUpdate::new(timestamp, points)
}

/// Wire payload for `update`.
pub fn encoded(update: &CurveUpdate) -> Vec<u8> {
    decoder::encode(update).expect("fixture update encodes")
}

/// Install a test-friendly subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
