//! Lipstick layer: fill the lip band, cut out the mouth cavity, edge the
//! outline.

use log::trace;

use super::canvas::{Color, OverlayCanvas};
use super::path::ClosedCurve;
use super::transform::DisplayPoint;

/// Samples per spline segment when flattening for rasterization.
const FLATTEN_STEPS: usize = 12;

/// Dark low-opacity edge stroke that keeps the shape defined against skin.
const STROKE_COLOR: Color = [0, 0, 0, 77];
const STROKE_WIDTH: f32 = 2.0;

/// Draw one frame's lipstick onto the canvas.
///
/// The outer ring is filled and the inner ring, traversed in reverse so
/// the even-odd rule treats it as a hole, punches out the mouth cavity.
/// Returns false when the outer ring is too sparse to form a shape, in
/// which case nothing is drawn and the caller should treat the frame as
/// faceless.
pub fn render_lips(
    canvas: &mut OverlayCanvas,
    outer: &[DisplayPoint],
    inner: &[DisplayPoint],
    color: Color,
    opacity: f32,
) -> bool {
    if outer.len() < 3 {
        trace!("outer lip ring has {} points, skipping", outer.len());
        return false;
    }

    let outer_curve = match ClosedCurve::from_ring(outer) {
        Some(curve) => curve,
        None => return false,
    };
    let outer_flat = outer_curve.flatten(FLATTEN_STEPS);

    if inner.len() >= 3 {
        let reversed: Vec<DisplayPoint> = inner.iter().rev().copied().collect();
        if let Some(inner_curve) = ClosedCurve::from_ring(&reversed) {
            let inner_flat = inner_curve.flatten(FLATTEN_STEPS);
            canvas.fill_even_odd(&[&outer_flat, &inner_flat], color, opacity);
        } else {
            canvas.fill_even_odd(&[&outer_flat], color, opacity);
        }
    } else {
        canvas.fill_even_odd(&[&outer_flat], color, opacity);
    }

    canvas.stroke_closed(&outer_flat, STROKE_COLOR, 1.0, STROKE_WIDTH);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> DisplayPoint {
        DisplayPoint::new(x, y)
    }

    fn canvas(w: u32, h: u32) -> OverlayCanvas {
        let mut c = OverlayCanvas::new();
        c.resize(w, h, 1.0);
        c
    }

    fn filled_count(canvas: &OverlayCanvas) -> usize {
        canvas.pixels().chunks_exact(4).filter(|px| px[3] > 0).count()
    }

    const RED: Color = [200, 30, 60, 255];

    #[test]
    fn test_sparse_outer_ring_draws_nothing() {
        let mut c = canvas(64, 64);
        assert!(!render_lips(&mut c, &[p(10.0, 10.0), p(50.0, 10.0)], &[], RED, 1.0));
        assert!(c.is_blank());
    }

    #[test]
    fn test_square_ring_fills_roughly_its_area() {
        let mut c = canvas(64, 64);
        let s = 30.0;
        let outer = [p(10.0, 10.0), p(10.0 + s, 10.0), p(10.0 + s, 10.0 + s), p(10.0, 10.0 + s)];
        assert!(render_lips(&mut c, &outer, &[], RED, 1.0));
        // The spline bulges past the square's corners a little; accept a
        // band around the polygon area.
        let area = filled_count(&c) as f32;
        assert!(area >= 0.95 * s * s, "area {}", area);
        assert!(area <= 1.50 * s * s, "area {}", area);
    }

    #[test]
    fn test_inner_ring_leaves_cavity_unpainted() {
        let mut c = canvas(80, 80);
        let outer = [p(10.0, 10.0), p(60.0, 10.0), p(60.0, 60.0), p(10.0, 60.0)];
        let inner = [p(25.0, 25.0), p(45.0, 25.0), p(45.0, 45.0), p(25.0, 45.0)];
        assert!(render_lips(&mut c, &outer, &inner, RED, 1.0));
        let px = |x: usize, y: usize| c.pixels()[(y * 80 + x) * 4 + 3];
        // Cavity center untouched, band painted.
        assert_eq!(px(35, 35), 0);
        assert!(px(17, 35) > 0);
        assert!(px(35, 17) > 0);
    }

    #[test]
    fn test_fill_carries_configured_color() {
        let mut c = canvas(64, 64);
        let outer = [p(10.0, 10.0), p(50.0, 10.0), p(50.0, 50.0), p(10.0, 50.0)];
        assert!(render_lips(&mut c, &outer, &[], RED, 1.0));
        let idx = (30 * 64 + 30) * 4;
        let px = &c.pixels()[idx..idx + 4];
        assert_eq!(px, &[RED[0], RED[1], RED[2], 255]);
    }
}
