//! The try-on overlay pipeline.
//!
//! One call per display frame: project the detector's landmarks through
//! the cover-fit transform, smooth them, build the lip curves, and draw
//! lipstick (and optionally eyelashes) onto the overlay canvas. The
//! surrounding app owns the camera and detector and composites the canvas
//! over the video image afterwards.

pub mod canvas;
pub mod eyelash;
pub mod lipstick;
pub mod path;
pub mod smoothing;
pub mod topology;
pub mod transform;

use std::collections::HashMap;

use log::debug;

use crate::ml::LandmarkSet;
use canvas::{Color, OverlayCanvas};
use eyelash::{EyelashPlacement, EyelashSprite};
use smoothing::{LandmarkSmoother, SmoothingParams};
use transform::{CoverTransform, DisplayPoint};

/// Per-frame style snapshot, read once at the top of an iteration so a
/// concurrent settings change cannot tear mid-draw.
#[derive(Clone, Copy, Debug)]
pub struct FrameStyle {
    pub color: Color,
    pub opacity: f32,
    pub eyelashes_enabled: bool,
    pub mirror: bool,
}

/// What a frame-loop iteration did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Camera or container dimensions not known yet; nothing drawn.
    AwaitingInputs,
    /// No usable face this frame; overlay cleared, smoothing state reset.
    NoFace,
    /// Overlay drawn.
    Rendered,
}

/// Owns the drawing surface and all cross-frame overlay state.
pub struct TryOnRenderer {
    canvas: OverlayCanvas,
    smoother: LandmarkSmoother,
    sprite: EyelashSprite,
    face_detected: bool,
}

impl TryOnRenderer {
    pub fn new(sprite: EyelashSprite, smoothing: SmoothingParams) -> Self {
        Self {
            canvas: OverlayCanvas::new(),
            smoother: LandmarkSmoother::new(smoothing),
            sprite,
            face_detected: false,
        }
    }

    /// Whether the most recent rendered-or-missed frame saw a face.
    pub fn face_detected(&self) -> bool {
        self.face_detected
    }

    pub fn canvas(&self) -> &OverlayCanvas {
        &self.canvas
    }

    pub fn set_smoothing(&mut self, params: SmoothingParams) {
        self.smoother.set_params(params);
    }

    /// Run one iteration of the overlay pipeline.
    ///
    /// `detection` is `None` when the detector saw no face (or errored;
    /// the caller folds errors into a miss). Dimension changes are picked
    /// up here every frame, so camera renegotiation and container resizes
    /// need no special handling.
    pub fn render_frame(
        &mut self,
        detection: Option<&LandmarkSet>,
        frame_width: u32,
        frame_height: u32,
        container_width: u32,
        container_height: u32,
        pixel_ratio: f32,
        style: &FrameStyle,
    ) -> FrameOutcome {
        let transform = match CoverTransform::compute(
            frame_width,
            frame_height,
            container_width,
            container_height,
        ) {
            Some(t) => t,
            None => return FrameOutcome::AwaitingInputs,
        };
        self.canvas.resize(container_width, container_height, pixel_ratio);

        let landmarks = match detection {
            Some(set) if !set.is_empty() => set,
            _ => return self.miss(),
        };

        let mapped: Vec<(usize, DisplayPoint)> = topology::tracked_indices()
            .filter_map(|index| {
                landmarks
                    .get(index)
                    .map(|p| (index, transform.project(p, container_width, style.mirror)))
            })
            .collect();
        let smoothed = self.smoother.smooth(&mapped);

        let outer = ring_points(&smoothed, &topology::LIP_OUTER);
        if outer.len() < 3 {
            debug!("outer lip ring incomplete ({} points)", outer.len());
            return self.miss();
        }
        let inner = ring_points(&smoothed, &topology::LIP_INNER);

        self.canvas.clear();
        if !lipstick::render_lips(&mut self.canvas, &outer, &inner, style.color, style.opacity) {
            return self.miss();
        }

        if style.eyelashes_enabled {
            for (a, b) in [topology::LEFT_EYE_CORNERS, topology::RIGHT_EYE_CORNERS] {
                if let (Some(&p1), Some(&p2)) = (smoothed.get(&a), smoothed.get(&b)) {
                    self.sprite
                        .draw(&mut self.canvas, EyelashPlacement::from_eye_corners(p1, p2));
                }
            }
        }

        self.face_detected = true;
        FrameOutcome::Rendered
    }

    fn miss(&mut self) -> FrameOutcome {
        self.canvas.clear();
        self.smoother.reset();
        self.face_detected = false;
        FrameOutcome::NoFace
    }
}

fn ring_points(
    smoothed: &HashMap<usize, DisplayPoint>,
    ring: &[usize],
) -> Vec<DisplayPoint> {
    ring.iter()
        .filter_map(|index| smoothed.get(index).copied())
        .collect()
}
