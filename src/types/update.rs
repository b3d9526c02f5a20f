//! Curve update record carried by one wire message

use serde::{Deserialize, Serialize};

use super::Point3;

/// One decoded curve update.
///
/// This is the fundamental data unit that flows from the network into the
/// curve store. The point order defines the path order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CurveUpdate {
    /// Producer-side sequence/time marker (milliseconds since the epoch for the
    /// reference server). Monotonicity is not guaranteed by producers.
    /// Fractional, exponent-form and negative numbers fail to decode.
    pub timestamp: u64,

    /// Ordered control points, possibly empty.
    pub points: Vec<Point3>,
}

impl CurveUpdate {
    /// Create a new curve update
    pub fn new(timestamp: u64, points: Vec<Point3>) -> Self {
        Self { timestamp, points }
    }

    /// Whether the update cannot form a proper path (fewer than two points).
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 2
    }
}
