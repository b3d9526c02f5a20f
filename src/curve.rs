//! Smooth interpolating curve through an ordered control-point sequence.
//!
//! [`Curve`] is an open Catmull-Rom spline. The end segments use phantom
//! control points reflected through the first and last knots, so every knot
//! (including both ends) lies on the curve. The curve is parameterized over
//! `[0, 1]` with knot `i` of `n` at `t = i / (n - 1)`.
//!
//! A curve is immutable once built and is shared between the network side and
//! the render loop behind an `Arc`.

use serde::{Deserialize, Serialize};

use crate::types::{CurveUpdate, Point3};

/// Number of chords used to approximate arc length.
pub const ARC_LENGTH_DIVISIONS: usize = 200;

/// Knot spacing below this is treated as coincident.
const MIN_KNOT_INTERVAL: f64 = 1e-4;

/// Catmull-Rom flavour.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveKind {
    /// Knot intervals follow the square root of the chord length. Avoids cusps
    /// and self-intersections within a segment.
    #[default]
    Centripetal,
    /// Knot intervals follow the chord length.
    Chordal,
    /// Evenly spaced knots with the given tension (0.5 is the classic spline).
    Uniform { tension: f64 },
}

impl CurveKind {
    fn exponent(self) -> Option<f64> {
        match self {
            // Applied to squared distances.
            CurveKind::Centripetal => Some(0.25),
            CurveKind::Chordal => Some(0.5),
            CurveKind::Uniform { .. } => None,
        }
    }
}

/// Cubic `c0 + c1 t + c2 t^2 + c3 t^3` in one coordinate.
#[derive(Debug, Clone, Copy)]
struct Cubic {
    c0: f64,
    c1: f64,
    c2: f64,
    c3: f64,
}

impl Cubic {
    fn hermite(x0: f64, x1: f64, t0: f64, t1: f64) -> Self {
        Self { c0: x0, c1: t0, c2: -3.0 * x0 + 3.0 * x1 - 2.0 * t0 - t1, c3: 2.0 * x0 - 2.0 * x1 + t0 + t1 }
    }

    fn catmull_rom(x0: f64, x1: f64, x2: f64, x3: f64, tension: f64) -> Self {
        Self::hermite(x1, x2, tension * (x2 - x0), tension * (x3 - x1))
    }

    fn non_uniform(x0: f64, x1: f64, x2: f64, x3: f64, dt0: f64, dt1: f64, dt2: f64) -> Self {
        let t1 = (x1 - x0) / dt0 - (x2 - x0) / (dt0 + dt1) + (x2 - x1) / dt1;
        let t2 = (x2 - x1) / dt1 - (x3 - x1) / (dt1 + dt2) + (x3 - x2) / dt2;
        Self::hermite(x1, x2, t1 * dt1, t2 * dt1)
    }

    fn value(&self, t: f64) -> f64 {
        let t2 = t * t;
        self.c0 + self.c1 * t + self.c2 * t2 + self.c3 * t2 * t
    }

    fn derivative(&self, t: f64) -> f64 {
        self.c1 + 2.0 * self.c2 * t + 3.0 * self.c3 * t * t
    }
}

#[derive(Debug, Clone, Copy)]
struct Segment {
    x: Cubic,
    y: Cubic,
    z: Cubic,
}

impl Segment {
    fn point(&self, w: f64) -> Point3 {
        Point3::new(self.x.value(w), self.y.value(w), self.z.value(w))
    }

    fn velocity(&self, w: f64) -> Point3 {
        Point3::new(self.x.derivative(w), self.y.derivative(w), self.z.derivative(w))
    }
}

/// Interpolating path built from exactly one [`CurveUpdate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    timestamp: u64,
    points: Vec<Point3>,
    kind: CurveKind,
    /// Cumulative chord length at `ARC_LENGTH_DIVISIONS + 1` evenly spaced
    /// parameters; empty for curves with fewer than two points.
    lengths: Vec<f64>,
}

impl Curve {
    /// Build a curve from an update's points.
    pub fn from_update(update: CurveUpdate, kind: CurveKind) -> Self {
        Self::new(update.timestamp, update.points, kind)
    }

    pub fn new(timestamp: u64, points: Vec<Point3>, kind: CurveKind) -> Self {
        let mut curve = Self { timestamp, points, kind, lengths: Vec::new() };
        curve.lengths = curve.arc_lengths();
        curve
    }

    /// Producer timestamp of the update this curve was built from
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Control points in path order
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn kind(&self) -> CurveKind {
        self.kind
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Fewer than two control points.
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 2
    }

    /// Approximate arc length of the whole curve.
    pub fn length(&self) -> f64 {
        self.lengths.last().copied().unwrap_or(0.0)
    }

    /// Position at parameter `t` (clamped to `[0, 1]`).
    ///
    /// Returns `None` only for an empty curve. A single-point curve is that
    /// point everywhere. Knots are returned exactly.
    pub fn point_at(&self, t: f64) -> Option<Point3> {
        match self.points.as_slice() {
            [] => None,
            [only] => Some(*only),
            _ => {
                let (index, weight) = self.locate(t);
                if weight == 0.0 {
                    Some(self.points[index])
                } else if weight == 1.0 {
                    Some(self.points[index + 1])
                } else {
                    Some(self.segment(index).point(weight))
                }
            }
        }
    }

    /// Unit tangent at parameter `t`, or `None` where the curve has no
    /// direction (empty, single point, or coincident knots).
    pub fn tangent_at(&self, t: f64) -> Option<Point3> {
        if self.is_degenerate() {
            return None;
        }
        let (index, weight) = self.locate(t);
        self.segment(index).velocity(weight).try_normalize()
    }

    /// Map a fraction of arc length `u` to the curve parameter `t`.
    pub fn t_for_arc_fraction(&self, u: f64) -> f64 {
        let u = clamp_unit(u);
        let total = self.length();
        if u <= 0.0 {
            return 0.0;
        }
        if u >= 1.0 {
            return 1.0;
        }
        // Coordinates near f64::MAX overflow the table; fall back to uniform.
        if !total.is_finite() || total <= 0.0 {
            return u;
        }

        let target = u * total;
        let last = self.lengths.len() - 1;
        let idx = self.lengths.partition_point(|&l| l < target);
        if idx == 0 {
            return 0.0;
        }
        if idx > last {
            return 1.0;
        }
        if self.lengths[idx] == target {
            return idx as f64 / last as f64;
        }

        let before = self.lengths[idx - 1];
        let after = self.lengths[idx];
        let span = after - before;
        let fraction = if span > 0.0 { (target - before) / span } else { 0.0 };
        ((idx - 1) as f64 + fraction) / last as f64
    }

    /// Segment index and local weight for a global parameter.
    fn locate(&self, t: f64) -> (usize, f64) {
        let segments = self.points.len() - 1;
        let p = segments as f64 * clamp_unit(t);
        let index = p.floor() as usize;
        if index >= segments { (segments - 1, 1.0) } else { (index, p - index as f64) }
    }

    fn segment(&self, index: usize) -> Segment {
        let pts = &self.points;
        let n = pts.len();
        let p1 = pts[index];
        let p2 = pts[index + 1];
        let p0 = if index > 0 { pts[index - 1] } else { p1 + (p1 - p2) };
        let p3 = if index + 2 < n { pts[index + 2] } else { p2 + (p2 - p1) };

        // Knot intervals that overflow fall back to the uniform spline.
        let knots = self.kind.exponent().map(|exp| {
            [p0.distance_squared(p1), p1.distance_squared(p2), p2.distance_squared(p3)].map(|d| d.powf(exp))
        });

        match knots.filter(|dts| dts.iter().all(|dt| dt.is_finite())) {
            Some([mut dt0, mut dt1, mut dt2]) => {
                if dt1 < MIN_KNOT_INTERVAL {
                    dt1 = 1.0;
                }
                if dt0 < MIN_KNOT_INTERVAL {
                    dt0 = dt1;
                }
                if dt2 < MIN_KNOT_INTERVAL {
                    dt2 = dt1;
                }
                Segment {
                    x: Cubic::non_uniform(p0.x, p1.x, p2.x, p3.x, dt0, dt1, dt2),
                    y: Cubic::non_uniform(p0.y, p1.y, p2.y, p3.y, dt0, dt1, dt2),
                    z: Cubic::non_uniform(p0.z, p1.z, p2.z, p3.z, dt0, dt1, dt2),
                }
            }
            None => {
                let tension = match self.kind {
                    CurveKind::Uniform { tension } => tension,
                    _ => 0.5,
                };
                Segment {
                    x: Cubic::catmull_rom(p0.x, p1.x, p2.x, p3.x, tension),
                    y: Cubic::catmull_rom(p0.y, p1.y, p2.y, p3.y, tension),
                    z: Cubic::catmull_rom(p0.z, p1.z, p2.z, p3.z, tension),
                }
            }
        }
    }

    fn arc_lengths(&self) -> Vec<f64> {
        if self.is_degenerate() {
            return Vec::new();
        }
        let mut lengths = Vec::with_capacity(ARC_LENGTH_DIVISIONS + 1);
        let mut sum = 0.0;
        let mut last = self.points[0];
        lengths.push(0.0);
        for i in 1..=ARC_LENGTH_DIVISIONS {
            let t = i as f64 / ARC_LENGTH_DIVISIONS as f64;
            let current = self.point_at(t).unwrap_or(last);
            sum += current.distance(last);
            lengths.push(sum);
            last = current;
        }
        lengths
    }
}

fn clamp_unit(t: f64) -> f64 {
    if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_ish() -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 1.0),
        ]
    }

    #[test]
    fn knots_are_interpolated_exactly() {
        for kind in [CurveKind::Centripetal, CurveKind::Chordal, CurveKind::Uniform { tension: 0.5 }] {
            let points = square_ish();
            let curve = Curve::new(0, points.clone(), kind);
            for (i, p) in points.iter().enumerate() {
                let t = i as f64 / (points.len() - 1) as f64;
                assert_eq!(curve.point_at(t), Some(*p), "{kind:?} knot {i}");
            }
        }
    }

    #[test]
    fn two_points_make_a_straight_segment() {
        let curve = Curve::new(0, vec![Point3::ORIGIN, Point3::new(2.0, 0.0, 0.0)], CurveKind::Centripetal);
        let mid = curve.point_at(0.5).unwrap();
        assert!((mid - Point3::new(1.0, 0.0, 0.0)).length() < 1e-12);
        assert!((curve.length() - 2.0).abs() < 1e-9);
        let tangent = curve.tangent_at(0.25).unwrap();
        assert!((tangent - Point3::UNIT_X).length() < 1e-12);
    }

    #[test]
    fn parameter_is_clamped() {
        let curve = Curve::new(0, square_ish(), CurveKind::default());
        assert_eq!(curve.point_at(-3.0), curve.point_at(0.0));
        assert_eq!(curve.point_at(7.0), curve.point_at(1.0));
        assert_eq!(curve.point_at(f64::NAN), curve.point_at(0.0));
    }

    #[test]
    fn degenerate_curves() {
        let empty = Curve::new(0, Vec::new(), CurveKind::default());
        assert!(empty.is_empty());
        assert_eq!(empty.point_at(0.5), None);
        assert_eq!(empty.tangent_at(0.5), None);
        assert_eq!(empty.length(), 0.0);

        let p = Point3::new(4.0, 5.0, 6.0);
        let single = Curve::new(0, vec![p], CurveKind::default());
        assert_eq!(single.point_at(0.0), Some(p));
        assert_eq!(single.point_at(0.7), Some(p));
        assert_eq!(single.tangent_at(0.7), None);
        assert_eq!(single.t_for_arc_fraction(0.3), 0.3);
    }

    #[test]
    fn coincident_points_stay_finite() {
        let p = Point3::new(1.0, 1.0, 1.0);
        let curve = Curve::new(0, vec![p, p, p], CurveKind::Centripetal);
        for i in 0..=10 {
            let q = curve.point_at(i as f64 / 10.0).unwrap();
            assert!(q.is_finite());
            assert!((q - p).length() < 1e-12);
        }
        assert_eq!(curve.length(), 0.0);
    }

    #[test]
    fn arc_length_mapping_is_monotone_and_anchored() {
        let curve = Curve::new(0, square_ish(), CurveKind::default());
        assert_eq!(curve.t_for_arc_fraction(0.0), 0.0);
        assert_eq!(curve.t_for_arc_fraction(1.0), 1.0);
        let mut previous = 0.0;
        for i in 1..100 {
            let t = curve.t_for_arc_fraction(i as f64 / 100.0);
            assert!(t >= previous, "mapping went backwards at {i}");
            previous = t;
        }
    }

    #[test]
    fn arc_length_of_straight_line_is_linear() {
        let curve = Curve::new(
            0,
            vec![Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)],
            CurveKind::Centripetal,
        );
        let t = curve.t_for_arc_fraction(0.25);
        assert!((curve.point_at(t).unwrap().x - 0.5).abs() < 1e-3);
    }
}
