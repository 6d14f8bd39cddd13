//! Eyelash sprite placement from eye-corner landmarks.
//!
//! Cosmetic best-effort overlay: if the sprite asset is missing the
//! feature silently does nothing, the rest of the pipeline is unaffected.

use std::path::Path;

use image::RgbaImage;
use log::{info, warn};

use super::canvas::OverlayCanvas;
use super::transform::DisplayPoint;

/// Sprite width as a multiple of the eye-corner span.
const WIDTH_SCALE: f32 = 2.2;
/// Sprite height as a fraction of its placed width.
const ASPECT_RATIO: f32 = 0.45;

/// Rigid placement of one eyelash sprite in display space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EyelashPlacement {
    pub center: DisplayPoint,
    pub width: f32,
    pub height: f32,
    pub angle: f32,
}

impl EyelashPlacement {
    /// Derive the placement from the two eye corners. `p1` and `p2` must
    /// come in a consistent order per eye or the angle flips by pi.
    pub fn from_eye_corners(p1: DisplayPoint, p2: DisplayPoint) -> EyelashPlacement {
        let width = p1.distance(&p2) * WIDTH_SCALE;
        EyelashPlacement {
            center: p1.midpoint(&p2),
            width,
            height: width * ASPECT_RATIO,
            angle: (p2.y - p1.y).atan2(p2.x - p1.x),
        }
    }
}

/// The eyelash sprite, loaded once at startup if the asset exists.
pub struct EyelashSprite {
    image: Option<RgbaImage>,
}

impl EyelashSprite {
    /// Load the sprite from `path`. A missing or unreadable file is
    /// logged and leaves the sprite unloaded, never an error.
    pub fn load(path: &Path) -> EyelashSprite {
        match image::open(path) {
            Ok(img) => {
                let image = img.to_rgba8();
                info!(
                    "loaded eyelash sprite {} ({}x{})",
                    path.display(),
                    image.width(),
                    image.height()
                );
                EyelashSprite { image: Some(image) }
            }
            Err(e) => {
                warn!("eyelash sprite unavailable ({}): {}", path.display(), e);
                EyelashSprite { image: None }
            }
        }
    }

    pub fn unloaded() -> EyelashSprite {
        EyelashSprite { image: None }
    }

    #[cfg(test)]
    pub fn from_image(image: RgbaImage) -> EyelashSprite {
        EyelashSprite { image: Some(image) }
    }

    pub fn is_loaded(&self) -> bool {
        self.image.is_some()
    }

    /// Draw the sprite at the given placement, or do nothing if the asset
    /// never loaded.
    pub fn draw(&self, canvas: &mut OverlayCanvas, placement: EyelashPlacement) {
        if let Some(image) = &self.image {
            canvas.draw_sprite(
                image,
                placement.center,
                placement.width,
                placement.height,
                placement.angle,
            );
        }
    }
}
