//! CPU raster surface for the overlay.
//!
//! An RGBA8 buffer sized container-pixels × device-pixel-ratio. Drawing
//! calls take logical (container) coordinates; the canvas applies the
//! pixel-ratio scale itself, matching how the overlay is later composited
//! over the camera image at device resolution. Nothing persists between
//! frames: the driver clears the whole surface before drawing.

use image::RgbaImage;

use super::transform::DisplayPoint;

/// RGBA color with 0..=255 channels.
pub type Color = [u8; 4];

/// Source-over blend of `src` (with an extra opacity factor) onto `dst`.
fn blend_over(dst: &mut [u8], src: Color, opacity: f32) {
    let src_a = (src[3] as f32 / 255.0) * opacity.clamp(0.0, 1.0);
    if src_a <= 0.0 {
        return;
    }
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    if out_a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let s = src[c] as f32 / 255.0;
        let d = dst[c] as f32 / 255.0;
        let out = (s * src_a + d * dst_a * (1.0 - src_a)) / out_a;
        dst[c] = (out * 255.0 + 0.5) as u8;
    }
    dst[3] = (out_a * 255.0 + 0.5) as u8;
}

/// The overlay drawing surface.
pub struct OverlayCanvas {
    width: u32,
    height: u32,
    scale: f32,
    pixels: Vec<u8>,
}

impl OverlayCanvas {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            scale: 1.0,
            pixels: Vec::new(),
        }
    }

    /// Ensure the backing store matches `container × pixel_ratio`,
    /// reallocating only when the required pixel size actually changes.
    pub fn resize(&mut self, container_width: u32, container_height: u32, pixel_ratio: f32) {
        let pixel_ratio = if pixel_ratio > 0.0 { pixel_ratio } else { 1.0 };
        let width = (container_width as f32 * pixel_ratio).round() as u32;
        let height = (container_height as f32 * pixel_ratio).round() as u32;
        self.scale = pixel_ratio;
        if width != self.width || height != self.height {
            self.width = width;
            self.height = height;
            self.pixels = vec![0; (width as usize) * (height as usize) * 4];
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Reset every pixel to transparent black.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// True when nothing has been drawn since the last clear.
    pub fn is_blank(&self) -> bool {
        self.pixels.chunks_exact(4).all(|px| px[3] == 0)
    }

    /// Fill the union of closed polylines under the even-odd rule.
    ///
    /// Subpaths are closed implicitly (last vertex connects to first).
    /// Parity across all subpaths together is what produces the inner-ring
    /// cutout for the mouth cavity.
    pub fn fill_even_odd(&mut self, subpaths: &[&[DisplayPoint]], color: Color, opacity: f32) {
        if self.pixels.is_empty() {
            return;
        }

        // Gather device-space edges, tracking the vertical extent.
        let mut edges: Vec<(f32, f32, f32, f32)> = Vec::new();
        let mut min_y = f32::MAX;
        let mut max_y = f32::MIN;
        for path in subpaths {
            let n = path.len();
            if n < 3 {
                continue;
            }
            for i in 0..n {
                let a = path[i];
                let b = path[(i + 1) % n];
                let (x0, y0) = (a.x * self.scale, a.y * self.scale);
                let (x1, y1) = (b.x * self.scale, b.y * self.scale);
                if y0 != y1 {
                    edges.push((x0, y0, x1, y1));
                    min_y = min_y.min(y0.min(y1));
                    max_y = max_y.max(y0.max(y1));
                }
            }
        }
        if edges.is_empty() {
            return;
        }

        let y_start = (min_y.floor().max(0.0)) as i64;
        let y_end = (max_y.ceil().min(self.height as f32)) as i64;
        let mut crossings: Vec<f32> = Vec::new();

        for row in y_start..y_end {
            let sample_y = row as f32 + 0.5;
            crossings.clear();
            for &(x0, y0, x1, y1) in &edges {
                // Half-open span so shared vertices count once.
                let crosses = (y0 <= sample_y && sample_y < y1) || (y1 <= sample_y && sample_y < y0);
                if crosses {
                    let t = (sample_y - y0) / (y1 - y0);
                    crossings.push(x0 + t * (x1 - x0));
                }
            }
            if crossings.len() < 2 {
                continue;
            }
            crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

            for pair in crossings.chunks_exact(2) {
                let x_first = ((pair[0] - 0.5).ceil().max(0.0)) as i64;
                let x_last = ((pair[1] - 0.5).floor().min(self.width as f32 - 1.0)) as i64;
                for col in x_first..=x_last {
                    let idx = ((row as usize) * self.width as usize + col as usize) * 4;
                    blend_over(&mut self.pixels[idx..idx + 4], color, opacity);
                }
            }
        }
    }

    /// Stroke a closed polyline at the given width by filling one quad per
    /// segment. Good enough for the thin outline this overlay needs.
    pub fn stroke_closed(&mut self, path: &[DisplayPoint], color: Color, opacity: f32, width: f32) {
        let n = path.len();
        if n < 2 || width <= 0.0 {
            return;
        }
        let half = width / 2.0;
        for i in 0..n {
            let a = path[i];
            let b = path[(i + 1) % n];
            let dx = b.x - a.x;
            let dy = b.y - a.y;
            let len = (dx * dx + dy * dy).sqrt();
            if len <= f32::EPSILON {
                continue;
            }
            let nx = -dy / len * half;
            let ny = dx / len * half;
            let quad = [
                DisplayPoint::new(a.x + nx, a.y + ny),
                DisplayPoint::new(b.x + nx, b.y + ny),
                DisplayPoint::new(b.x - nx, b.y - ny),
                DisplayPoint::new(a.x - nx, a.y - ny),
            ];
            self.fill_even_odd(&[&quad], color, opacity);
        }
    }

    /// Place a sprite centered at `center`, scaled to `width × height` and
    /// rotated by `angle` radians, sampling bilinearly.
    pub fn draw_sprite(
        &mut self,
        sprite: &RgbaImage,
        center: DisplayPoint,
        width: f32,
        height: f32,
        angle: f32,
    ) {
        if self.pixels.is_empty() || sprite.width() == 0 || sprite.height() == 0 {
            return;
        }
        if width <= 0.0 || height <= 0.0 {
            return;
        }

        let cx = center.x * self.scale;
        let cy = center.y * self.scale;
        let w = width * self.scale;
        let h = height * self.scale;
        let (sin, cos) = angle.sin_cos();

        // Conservative bounding box of the rotated sprite.
        let radius = 0.5 * (w * w + h * h).sqrt();
        let x_min = ((cx - radius).floor().max(0.0)) as i64;
        let x_max = ((cx + radius).ceil().min(self.width as f32)) as i64;
        let y_min = ((cy - radius).floor().max(0.0)) as i64;
        let y_max = ((cy + radius).ceil().min(self.height as f32)) as i64;

        let sw = sprite.width() as f32;
        let sh = sprite.height() as f32;

        for row in y_min..y_max {
            for col in x_min..x_max {
                let px = col as f32 + 0.5 - cx;
                let py = row as f32 + 0.5 - cy;
                // Inverse rotation into sprite-local space.
                let lx = px * cos + py * sin;
                let ly = -px * sin + py * cos;
                let u = (lx / w + 0.5) * sw - 0.5;
                let v = (ly / h + 0.5) * sh - 0.5;
                if u < -0.5 || v < -0.5 || u > sw - 0.5 || v > sh - 0.5 {
                    continue;
                }
                let src = sample_bilinear(sprite, u, v);
                if src[3] == 0 {
                    continue;
                }
                let idx = ((row as usize) * self.width as usize + col as usize) * 4;
                blend_over(&mut self.pixels[idx..idx + 4], src, 1.0);
            }
        }
    }

    /// Source-over composite this canvas onto an equally sized RGBA
    /// background (the cover-fit camera image).
    pub fn composite_over(&self, background: &mut [u8]) {
        debug_assert_eq!(background.len(), self.pixels.len());
        for (dst, src) in background
            .chunks_exact_mut(4)
            .zip(self.pixels.chunks_exact(4))
        {
            if src[3] == 0 {
                continue;
            }
            blend_over(dst, [src[0], src[1], src[2], src[3]], 1.0);
        }
    }
}

impl Default for OverlayCanvas {
    fn default() -> Self {
        Self::new()
    }
}

fn sample_bilinear(sprite: &RgbaImage, u: f32, v: f32) -> Color {
    let max_x = sprite.width() as i64 - 1;
    let max_y = sprite.height() as i64 - 1;
    let x0 = u.floor() as i64;
    let y0 = v.floor() as i64;
    let fx = u - x0 as f32;
    let fy = v - y0 as f32;

    let fetch = |x: i64, y: i64| -> [f32; 4] {
        let x = x.clamp(0, max_x) as u32;
        let y = y.clamp(0, max_y) as u32;
        let p = sprite.get_pixel(x, y).0;
        [p[0] as f32, p[1] as f32, p[2] as f32, p[3] as f32]
    };

    let p00 = fetch(x0, y0);
    let p10 = fetch(x0 + 1, y0);
    let p01 = fetch(x0, y0 + 1);
    let p11 = fetch(x0 + 1, y0 + 1);

    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = p00[c] * (1.0 - fx) + p10[c] * fx;
        let bottom = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy + 0.5) as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f32, y: f32) -> DisplayPoint {
        DisplayPoint::new(x, y)
    }

    fn filled_count(canvas: &OverlayCanvas) -> usize {
        canvas.pixels().chunks_exact(4).filter(|px| px[3] > 0).count()
    }

    fn canvas(w: u32, h: u32) -> OverlayCanvas {
        let mut c = OverlayCanvas::new();
        c.resize(w, h, 1.0);
        c
    }

    const RED: Color = [255, 0, 0, 255];

    #[test]
    fn test_clear_makes_blank() {
        let mut c = canvas(20, 20);
        let square = [p(2.0, 2.0), p(12.0, 2.0), p(12.0, 12.0), p(2.0, 12.0)];
        c.fill_even_odd(&[&square], RED, 1.0);
        assert!(!c.is_blank());
        c.clear();
        assert!(c.is_blank());
    }

    #[test]
    fn test_square_fill_area() {
        let mut c = canvas(32, 32);
        let square = [p(4.0, 4.0), p(14.0, 4.0), p(14.0, 14.0), p(4.0, 14.0)];
        c.fill_even_odd(&[&square], RED, 1.0);
        // 10x10 square sampled at pixel centers.
        assert_eq!(filled_count(&c), 100);
    }

    #[test]
    fn test_inner_ring_punches_cutout() {
        let mut c = canvas(40, 40);
        let outer = [p(5.0, 5.0), p(25.0, 5.0), p(25.0, 25.0), p(5.0, 25.0)];
        let inner = [p(10.0, 10.0), p(10.0, 20.0), p(20.0, 20.0), p(20.0, 10.0)];
        c.fill_even_odd(&[&outer, &inner], RED, 1.0);
        // Band is painted, cavity is not.
        let px = |x: usize, y: usize| c.pixels()[(y * 40 + x) * 4 + 3];
        assert!(px(7, 15) > 0);
        assert!(px(15, 7) > 0);
        assert_eq!(px(15, 15), 0);
        // 20x20 minus 10x10.
        assert_eq!(filled_count(&c), 300);
    }

    #[test]
    fn test_fill_respects_opacity() {
        let mut c = canvas(16, 16);
        let square = [p(2.0, 2.0), p(10.0, 2.0), p(10.0, 10.0), p(2.0, 10.0)];
        c.fill_even_odd(&[&square], RED, 0.5);
        let alpha = c.pixels()[(5 * 16 + 5) * 4 + 3];
        assert!((alpha as i32 - 128).abs() <= 2);
    }

    #[test]
    fn test_degenerate_paths_draw_nothing() {
        let mut c = canvas(16, 16);
        c.fill_even_odd(&[&[p(1.0, 1.0), p(5.0, 5.0)]], RED, 1.0);
        c.stroke_closed(&[p(3.0, 3.0)], RED, 1.0, 2.0);
        assert!(c.is_blank());
    }

    #[test]
    fn test_stroke_covers_outline() {
        let mut c = canvas(32, 32);
        let square = [p(8.0, 8.0), p(24.0, 8.0), p(24.0, 24.0), p(8.0, 24.0)];
        c.stroke_closed(&square, RED, 1.0, 3.0);
        let px = |x: usize, y: usize| c.pixels()[(y * 32 + x) * 4 + 3];
        // On the edge: painted. In the middle: not.
        assert!(px(16, 8) > 0);
        assert!(px(8, 16) > 0);
        assert_eq!(px(16, 16), 0);
    }

    #[test]
    fn test_pixel_ratio_scales_geometry() {
        let mut c = OverlayCanvas::new();
        c.resize(16, 16, 2.0);
        assert_eq!(c.width(), 32);
        assert_eq!(c.height(), 32);
        let square = [p(2.0, 2.0), p(10.0, 2.0), p(10.0, 10.0), p(2.0, 10.0)];
        c.fill_even_odd(&[&square], RED, 1.0);
        // 8x8 logical square becomes 16x16 device pixels.
        assert_eq!(filled_count(&c), 256);
    }

    #[test]
    fn test_resize_reallocates_only_on_change() {
        let mut c = canvas(16, 16);
        let square = [p(2.0, 2.0), p(10.0, 2.0), p(10.0, 10.0), p(2.0, 10.0)];
        c.fill_even_odd(&[&square], RED, 1.0);
        c.resize(16, 16, 1.0);
        // Same size: contents survive until the explicit clear.
        assert!(!c.is_blank());
        c.resize(20, 16, 1.0);
        assert!(c.is_blank());
    }

    #[test]
    fn test_sprite_placement_axis_aligned() {
        let mut c = canvas(40, 40);
        let mut sprite = RgbaImage::new(4, 4);
        for px in sprite.pixels_mut() {
            *px = image::Rgba([0, 255, 0, 255]);
        }
        c.draw_sprite(&sprite, p(20.0, 20.0), 10.0, 6.0, 0.0);
        let px = |x: usize, y: usize| c.pixels()[(y * 40 + x) * 4 + 3];
        assert!(px(20, 20) > 0);
        assert!(px(16, 20) > 0);
        // Outside the 10x6 extent.
        assert_eq!(px(20, 26), 0);
        assert_eq!(px(28, 20), 0);
    }

    #[test]
    fn test_sprite_rotation_quarter_turn() {
        let mut c = canvas(40, 40);
        let mut sprite = RgbaImage::new(8, 2);
        for px in sprite.pixels_mut() {
            *px = image::Rgba([0, 0, 255, 255]);
        }
        // Wide flat sprite rotated 90 degrees becomes tall.
        c.draw_sprite(
            &sprite,
            p(20.0, 20.0),
            16.0,
            4.0,
            std::f32::consts::FRAC_PI_2,
        );
        let px = |x: usize, y: usize| c.pixels()[(y * 40 + x) * 4 + 3];
        assert!(px(20, 13) > 0);
        assert!(px(20, 27) > 0);
        assert_eq!(px(13, 20), 0);
    }

    #[test]
    fn test_composite_over_background() {
        let mut c = canvas(8, 8);
        let square = [p(0.0, 0.0), p(8.0, 0.0), p(8.0, 8.0), p(0.0, 8.0)];
        c.fill_even_odd(&[&square], [255, 0, 0, 255], 1.0);
        let mut background = vec![0u8; 8 * 8 * 4];
        for px in background.chunks_exact_mut(4) {
            px.copy_from_slice(&[0, 0, 255, 255]);
        }
        c.composite_over(&mut background);
        assert_eq!(&background[0..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_blank_composite_leaves_background() {
        let c = canvas(8, 8);
        let mut background = vec![7u8; 8 * 8 * 4];
        let expected = background.clone();
        c.composite_over(&mut background);
        assert_eq!(background, expected);
    }
}
