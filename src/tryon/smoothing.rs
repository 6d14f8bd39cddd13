//! Temporal smoothing of projected landmark positions.
//!
//! Raw detector output jitters by a pixel or two even on a still face.
//! Plain exponential smoothing hides that but lags behind fast motion, so
//! the blend factor is boosted whenever a landmark moves further than a
//! threshold in one frame.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::transform::DisplayPoint;

/// Tunable smoothing parameters.
///
/// These are empirically chosen, not contractual: small movements get the
/// base alpha, large movements get the boosted alpha.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SmoothingParams {
    /// Blend factor applied to slow movement (0..=1, higher = more
    /// responsive).
    pub base_alpha: f32,
    /// Added to `base_alpha` when movement exceeds the threshold, capped
    /// at 1.0.
    pub alpha_boost: f32,
    /// Per-frame movement (display pixels) above which the boost kicks in.
    pub movement_threshold: f32,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            base_alpha: 0.35,
            alpha_boost: 0.3,
            movement_threshold: 3.0,
        }
    }
}

impl SmoothingParams {
    /// Blend factor for a landmark that moved `distance` pixels.
    pub fn alpha_for(&self, distance: f32) -> f32 {
        if distance > self.movement_threshold {
            (self.base_alpha + self.alpha_boost).min(1.0)
        } else {
            self.base_alpha
        }
    }
}

/// Per-landmark exponential smoothing state across frames.
///
/// The state is replaced wholesale every frame: indices that were not
/// observed this frame drop out rather than going stale, and a missed
/// frame resets everything so a reappearing face snaps into place instead
/// of blending from a weeks-old position.
#[derive(Debug, Default)]
pub struct LandmarkSmoother {
    params: SmoothingParams,
    previous: HashMap<usize, DisplayPoint>,
}

impl LandmarkSmoother {
    pub fn new(params: SmoothingParams) -> Self {
        Self {
            params,
            previous: HashMap::new(),
        }
    }

    pub fn set_params(&mut self, params: SmoothingParams) {
        self.params = params;
    }

    /// Smooth one frame's worth of projected landmarks. Each entry is
    /// blended only against its own index from the previous frame; the
    /// first sighting of an index passes through unsmoothed.
    pub fn smooth(&mut self, mapped: &[(usize, DisplayPoint)]) -> HashMap<usize, DisplayPoint> {
        let mut smoothed = HashMap::with_capacity(mapped.len());

        for &(index, point) in mapped {
            let out = match self.previous.get(&index) {
                Some(prev) => {
                    let alpha = self.params.alpha_for(point.distance(prev));
                    DisplayPoint::new(
                        alpha * point.x + (1.0 - alpha) * prev.x,
                        alpha * point.y + (1.0 - alpha) * prev.y,
                    )
                }
                None => point,
            };
            smoothed.insert(index, out);
        }

        self.previous = smoothed.clone();
        smoothed
    }

    /// Forget all history. Called whenever a frame yields no usable face.
    pub fn reset(&mut self) {
        self.previous.clear();
    }

    /// Whether any history is held (true between two detected frames).
    pub fn has_state(&self) -> bool {
        !self.previous.is_empty()
    }
}
