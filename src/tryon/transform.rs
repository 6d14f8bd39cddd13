//! Cover-fit transform and landmark projection.
//!
//! Two coordinate spaces exist in this pipeline: source-frame space (camera
//! pixels, as reported by the detector) and display space (container
//! pixels). They get distinct point types so a source-space point cannot be
//! handed to a drawing routine without going through the projector.

/// A point in source-frame (camera pixel) space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SourcePoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// A point in display (container pixel) space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DisplayPoint {
    pub x: f32,
    pub y: f32,
}

impl DisplayPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another display-space point.
    pub fn distance(&self, other: &DisplayPoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Midpoint between two display-space points.
    pub fn midpoint(&self, other: &DisplayPoint) -> DisplayPoint {
        DisplayPoint::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Aspect-preserving crop-to-fill mapping from source-frame space to a
/// display container.
///
/// Only valid for the exact frame/container dimensions it was computed
/// from; callers recompute it whenever either changes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoverTransform {
    pub offset_x: f32,
    pub offset_y: f32,
    pub scale: f32,
}

impl CoverTransform {
    /// Compute the cover-fit transform, or `None` while either size is
    /// still unknown (zero). The scaled frame always fully covers the
    /// container; the overflow is cropped symmetrically.
    pub fn compute(
        frame_width: u32,
        frame_height: u32,
        container_width: u32,
        container_height: u32,
    ) -> Option<CoverTransform> {
        if frame_width == 0 || frame_height == 0 || container_width == 0 || container_height == 0 {
            return None;
        }

        let scale = f32::max(
            container_width as f32 / frame_width as f32,
            container_height as f32 / frame_height as f32,
        );
        let drawn_width = frame_width as f32 * scale;
        let drawn_height = frame_height as f32 * scale;

        Some(CoverTransform {
            offset_x: (container_width as f32 - drawn_width) / 2.0,
            offset_y: (container_height as f32 - drawn_height) / 2.0,
            scale,
        })
    }

    /// Project a source-space point into display space, optionally
    /// mirroring around the container's vertical centerline (selfie view).
    pub fn project(
        &self,
        point: SourcePoint,
        container_width: u32,
        mirror: bool,
    ) -> DisplayPoint {
        let x = point.x * self.scale + self.offset_x;
        let y = point.y * self.scale + self.offset_y;
        if mirror {
            DisplayPoint::new(container_width as f32 - x, y)
        } else {
            DisplayPoint::new(x, y)
        }
    }

    /// Inverse of the unmirrored projection; recovers the source point.
    pub fn unproject(&self, point: DisplayPoint) -> SourcePoint {
        SourcePoint {
            x: (point.x - self.offset_x) / self.scale,
            y: (point.y - self.offset_y) / self.scale,
            z: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_on_zero_dimension() {
        assert!(CoverTransform::compute(0, 480, 640, 300).is_none());
        assert!(CoverTransform::compute(640, 0, 640, 300).is_none());
        assert!(CoverTransform::compute(640, 480, 0, 300).is_none());
        assert!(CoverTransform::compute(640, 480, 640, 0).is_none());
    }

    #[test]
    fn test_cover_always_fills_container() {
        let cases = [
            (640u32, 480u32, 640u32, 300u32),
            (640, 480, 300, 640),
            (1280, 720, 480, 480),
            (480, 360, 1920, 1080),
        ];
        for (fw, fh, cw, ch) in cases {
            let t = CoverTransform::compute(fw, fh, cw, ch).unwrap();
            let drawn_w = fw as f32 * t.scale;
            let drawn_h = fh as f32 * t.scale;
            assert!(drawn_w >= cw as f32 - 1e-3, "{}x{} in {}x{}", fw, fh, cw, ch);
            assert!(drawn_h >= ch as f32 - 1e-3, "{}x{} in {}x{}", fw, fh, cw, ch);
            // Exactly one axis binds (tight fit).
            let tight_w = (drawn_w - cw as f32).abs() < 1e-3;
            let tight_h = (drawn_h - ch as f32).abs() < 1e-3;
            assert!(tight_w || tight_h);
        }
    }

    #[test]
    fn test_offsets_center_the_crop() {
        let t = CoverTransform::compute(640, 480, 640, 300).unwrap();
        // Width binds: scale = 1.0, height overflows by 180, centered.
        assert_eq!(t.scale, 1.0);
        assert_eq!(t.offset_x, 0.0);
        assert_eq!(t.offset_y, -90.0);
    }

    #[test]
    fn test_project_unproject_round_trip() {
        let t = CoverTransform::compute(640, 480, 800, 450).unwrap();
        let src = SourcePoint { x: 123.4, y: 456.7, z: 0.0 };
        let display = t.project(src, 800, false);
        let back = t.unproject(display);
        assert!((back.x - src.x).abs() < 1e-3);
        assert!((back.y - src.y).abs() < 1e-3);
    }

    #[test]
    fn test_mirror_flips_around_container_width() {
        let t = CoverTransform::compute(100, 100, 100, 100).unwrap();
        let p = t.project(SourcePoint { x: 10.0, y: 20.0, z: 0.0 }, 100, true);
        assert_eq!(p.x, 90.0);
        assert_eq!(p.y, 20.0);
    }
}
