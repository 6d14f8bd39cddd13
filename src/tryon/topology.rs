//! Face-mesh landmark topology consumed by the try-on renderer.
//!
//! Indices follow the MediaPipe face-mesh numbering (468 canonical points,
//! 478 with iris refinement). Only the lip rings and the eye corners are
//! used here; everything else in the mesh is ignored.

/// Outer lip ring, ordered clockwise around the mouth.
pub const LIP_OUTER: [usize; 20] = [
    61, 146, 91, 181, 84, 17, 314, 405, 321, 375, 291, 409, 270, 269, 267, 0, 37, 39, 40, 185,
];

/// Inner lip ring (mouth cavity boundary), same winding as [`LIP_OUTER`].
pub const LIP_INNER: [usize; 20] = [
    78, 95, 88, 178, 87, 14, 317, 402, 318, 324, 308, 415, 310, 311, 312, 13, 82, 81, 80, 191,
];

/// Left eye corners as (outer, inner) mesh indices.
pub const LEFT_EYE_CORNERS: (usize, usize) = (33, 133);

/// Right eye corners as (inner, outer) mesh indices.
pub const RIGHT_EYE_CORNERS: (usize, usize) = (362, 263);

/// Every landmark index the renderer projects and smooths.
pub fn tracked_indices() -> impl Iterator<Item = usize> {
    LIP_OUTER
        .iter()
        .chain(LIP_INNER.iter())
        .copied()
        .chain([
            LEFT_EYE_CORNERS.0,
            LEFT_EYE_CORNERS.1,
            RIGHT_EYE_CORNERS.0,
            RIGHT_EYE_CORNERS.1,
        ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_sizes() {
        assert_eq!(LIP_OUTER.len(), 20);
        assert_eq!(LIP_INNER.len(), 20);
    }

    #[test]
    fn test_rings_disjoint() {
        for idx in LIP_OUTER {
            assert!(!LIP_INNER.contains(&idx), "index {} in both rings", idx);
        }
    }

    #[test]
    fn test_tracked_indices_count() {
        assert_eq!(tracked_indices().count(), 44);
    }
}
