//! Fixed-resolution sampling of a [`Curve`] for per-frame mesh rebuilding.
//!
//! Sampling is a pure function of `(curve, count, parameterization)`: the same
//! arguments always produce bit-identical output, so a renderer may skip a
//! rebuild when neither the curve snapshot nor the count changed.
//!
//! # Degenerate curves
//!
//! - An empty curve samples to an empty sequence (nothing is rendered).
//! - A single-point curve samples to `count` copies of that point.
//!
//! # Example
//!
//! ```rust
//! use crow::{Curve, CurveKind, SampledPathAdapter, types::Point3};
//!
//! let curve = Curve::new(0, vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//! ], CurveKind::Centripetal);
//!
//! let samples = SampledPathAdapter::default().sample(&curve, 64);
//! assert_eq!(samples.len(), 64);
//! assert_eq!(samples[0], curve.points()[0]);
//! assert_eq!(samples[63], curve.points()[2]);
//! ```

use serde::{Deserialize, Serialize};

use crate::curve::Curve;
use crate::types::Point3;

/// How sample indices are spread over the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameterization {
    /// Even steps in the curve parameter
    #[default]
    Uniform,
    /// Even steps in arc length
    ArcLength,
}

/// Position plus a local orthonormal frame, as a tube builder consumes it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathFrame {
    pub position: Point3,
    pub tangent: Point3,
    pub normal: Point3,
    pub binormal: Point3,
}

/// Converts a curve into a fixed number of ordered samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SampledPathAdapter {
    parameterization: Parameterization,
}

impl SampledPathAdapter {
    /// Smallest sample count; smaller requests are raised to it.
    pub const MIN_COUNT: usize = 2;

    pub fn new(parameterization: Parameterization) -> Self {
        Self { parameterization }
    }

    pub fn parameterization(&self) -> Parameterization {
        self.parameterization
    }

    /// Sample `count` points from `t = 0` to `t = 1` inclusive.
    pub fn sample(&self, curve: &Curve, count: usize) -> Vec<Point3> {
        if curve.is_empty() {
            return Vec::new();
        }
        self.parameters(curve, count).filter_map(|t| curve.point_at(t)).collect()
    }

    /// Sample `count` positions with parallel-transported frames.
    ///
    /// Where the curve has no direction (single point, coincident knots) the
    /// nearest defined tangent is reused, falling back to +Z.
    pub fn sample_frames(&self, curve: &Curve, count: usize) -> Vec<PathFrame> {
        if curve.is_empty() {
            return Vec::new();
        }

        let params: Vec<f64> = self.parameters(curve, count).collect();
        let positions: Vec<Point3> = params.iter().filter_map(|&t| curve.point_at(t)).collect();
        let tangents = fill_tangents(params.iter().map(|&t| curve.tangent_at(t)).collect());

        let mut frames = Vec::with_capacity(positions.len());
        let mut normal = initial_normal(tangents[0]);
        for (i, (&position, &tangent)) in positions.iter().zip(tangents.iter()).enumerate() {
            if i > 0 {
                normal = transport(normal, tangents[i - 1], tangent);
            }
            frames.push(PathFrame { position, tangent, normal, binormal: tangent.cross(normal) });
        }
        frames
    }

    fn parameters<'a>(&self, curve: &'a Curve, count: usize) -> impl Iterator<Item = f64> + 'a {
        let count = count.max(Self::MIN_COUNT);
        let last = (count - 1) as f64;
        let parameterization = self.parameterization;
        (0..count).map(move |i| {
            let u = i as f64 / last;
            match parameterization {
                Parameterization::Uniform => u,
                Parameterization::ArcLength => curve.t_for_arc_fraction(u),
            }
        })
    }
}

/// Sample `count` points with uniform parameterization.
pub fn sample(curve: &Curve, count: usize) -> Vec<Point3> {
    SampledPathAdapter::default().sample(curve, count)
}

fn fill_tangents(raw: Vec<Option<Point3>>) -> Vec<Point3> {
    let first_defined = raw.iter().flatten().next().copied().unwrap_or(Point3::UNIT_Z);
    let mut previous = first_defined;
    raw.into_iter()
        .map(|t| {
            let t = t.unwrap_or(previous);
            previous = t;
            t
        })
        .collect()
}

/// Normal perpendicular to `tangent`, seeded from the axis least aligned with it.
fn initial_normal(tangent: Point3) -> Point3 {
    let (ax, ay, az) = (tangent.x.abs(), tangent.y.abs(), tangent.z.abs());
    let seed = if ax <= ay && ax <= az {
        Point3::UNIT_X
    } else if ay <= az {
        Point3::UNIT_Y
    } else {
        Point3::UNIT_Z
    };
    let side = tangent.cross(seed).try_normalize().unwrap_or(Point3::UNIT_Y);
    tangent.cross(side)
}

/// Rotate `normal` by the rotation carrying `from` onto `to`.
fn transport(normal: Point3, from: Point3, to: Point3) -> Point3 {
    let cross = from.cross(to);
    match cross.try_normalize() {
        Some(axis) => normal.rotate_about(axis, cross.length().atan2(from.dot(to))),
        None => normal,
    }
}
