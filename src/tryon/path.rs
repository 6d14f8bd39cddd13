//! Closed smooth path construction from a landmark ring.
//!
//! The lip rings are discrete polygons; drawn as-is they look faceted and
//! amplify jitter. Treating the ring as cyclic and estimating tangents
//! Catmull-Rom style gives a closed cubic spline that passes through every
//! input point exactly.

use super::transform::DisplayPoint;

/// One cubic Bezier segment of a closed curve.
#[derive(Clone, Copy, Debug)]
pub struct CubicSegment {
    pub from: DisplayPoint,
    pub cp1: DisplayPoint,
    pub cp2: DisplayPoint,
    pub to: DisplayPoint,
}

impl CubicSegment {
    /// Evaluate the cubic at parameter `t` in 0..=1.
    pub fn eval(&self, t: f32) -> DisplayPoint {
        let u = 1.0 - t;
        let b0 = u * u * u;
        let b1 = 3.0 * u * u * t;
        let b2 = 3.0 * u * t * t;
        let b3 = t * t * t;
        DisplayPoint::new(
            b0 * self.from.x + b1 * self.cp1.x + b2 * self.cp2.x + b3 * self.to.x,
            b0 * self.from.y + b1 * self.cp1.y + b2 * self.cp2.y + b3 * self.to.y,
        )
    }
}

/// A closed smooth curve through an ordered ring of points.
#[derive(Clone, Debug)]
pub struct ClosedCurve {
    segments: Vec<CubicSegment>,
}

impl ClosedCurve {
    /// Build the curve. Returns `None` for rings of fewer than 2 points;
    /// callers wanting a fillable shape should require at least 3 and skip
    /// the frame otherwise.
    pub fn from_ring(ring: &[DisplayPoint]) -> Option<ClosedCurve> {
        let len = ring.len();
        if len < 2 {
            return None;
        }

        let mut segments = Vec::with_capacity(len);
        for i in 0..len {
            let p0 = ring[(i + len - 1) % len];
            let p1 = ring[i];
            let p2 = ring[(i + 1) % len];
            let p3 = ring[(i + 2) % len];

            segments.push(CubicSegment {
                from: p1,
                cp1: DisplayPoint::new(p1.x + (p2.x - p0.x) / 6.0, p1.y + (p2.y - p0.y) / 6.0),
                cp2: DisplayPoint::new(p2.x - (p3.x - p1.x) / 6.0, p2.y - (p3.y - p1.y) / 6.0),
                to: p2,
            });
        }

        Some(ClosedCurve { segments })
    }

    pub fn segments(&self) -> &[CubicSegment] {
        &self.segments
    }

    /// Flatten to a closed polyline with `steps` samples per segment. The
    /// last point of each segment is the first point of the next, so the
    /// result has `segments * steps` vertices and wraps implicitly.
    pub fn flatten(&self, steps: usize) -> Vec<DisplayPoint> {
        let steps = steps.max(1);
        let mut points = Vec::with_capacity(self.segments.len() * steps);
        for segment in &self.segments {
            for s in 0..steps {
                points.push(segment.eval(s as f32 / steps as f32));
            }
        }
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> DisplayPoint {
        DisplayPoint::new(x, y)
    }

    #[test]
    fn test_too_few_points() {
        assert!(ClosedCurve::from_ring(&[]).is_none());
        assert!(ClosedCurve::from_ring(&[p(0.0, 0.0)]).is_none());
        assert!(ClosedCurve::from_ring(&[p(0.0, 0.0), p(1.0, 1.0)]).is_some());
    }

    #[test]
    fn test_curve_passes_through_ring_points() {
        // Collinear ring: the curve must still hit every input point
        // exactly at segment boundaries.
        let ring = [p(0.0, 0.0), p(5.0, 0.0), p(10.0, 0.0)];
        let curve = ClosedCurve::from_ring(&ring).unwrap();
        assert_eq!(curve.segments().len(), 3);
        for (i, segment) in curve.segments().iter().enumerate() {
            assert_eq!(segment.from, ring[i]);
            assert_eq!(segment.to, ring[(i + 1) % ring.len()]);
            let start = segment.eval(0.0);
            assert!((start.x - ring[i].x).abs() < 1e-5);
            assert!((start.y - ring[i].y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_control_points_follow_neighbor_tangents() {
        let ring = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)];
        let curve = ClosedCurve::from_ring(&ring).unwrap();
        let seg = curve.segments()[0];
        // cp1 = p1 + (p2 - p0)/6 with p0 = (0,10), p2 = (10,0).
        assert!((seg.cp1.x - 10.0 / 6.0).abs() < 1e-5);
        assert!((seg.cp1.y - (-10.0 / 6.0)).abs() < 1e-5);
        // cp2 = p2 - (p3 - p1)/6 with p1 = (0,0), p3 = (10,10).
        assert!((seg.cp2.x - (10.0 - 10.0 / 6.0)).abs() < 1e-5);
        assert!((seg.cp2.y - (-10.0 / 6.0)).abs() < 1e-5);
    }

    #[test]
    fn test_flatten_contains_ring_points() {
        let ring = [p(0.0, 0.0), p(10.0, 0.0), p(10.0, 10.0), p(0.0, 10.0)];
        let curve = ClosedCurve::from_ring(&ring).unwrap();
        let flat = curve.flatten(8);
        assert_eq!(flat.len(), 32);
        for corner in ring {
            assert!(
                flat.iter().any(|q| q.distance(&corner) < 1e-4),
                "missing {:?}",
                corner
            );
        }
    }
}
