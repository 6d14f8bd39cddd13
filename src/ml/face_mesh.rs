//! MediaPipe-style face mesh inference via ONNX Runtime.
//!
//! Expects a face-landmark model from the PINTO Model Zoo (192x192 NHWC
//! input, one output of 3D landmark coordinates in input-pixel space and
//! one face-presence score). Landmarks are rescaled to source-frame
//! pixels before they leave this module.

use std::path::PathBuf;

use image::RgbaImage;
use ndarray::Array4;

use super::{DetectError, DetectorBackend, LandmarkSet};
use crate::tryon::transform::SourcePoint;

const INPUT_WIDTH: u32 = 192;
const INPUT_HEIGHT: u32 = 192;

/// Below this face-presence probability a frame counts as "no face".
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.35;

/// ONNX face-mesh detection backend.
pub struct FaceMeshModel {
    session: ort::session::Session,
    confidence_threshold: f32,
}

impl FaceMeshModel {
    /// Initialize ONNX Runtime and load the face-landmark model.
    pub fn load() -> Result<Self, String> {
        let model_dir = Self::find_model_dir()?;
        log::info!("Model directory: {:?}", model_dir);

        let model_path = model_dir.join("face_landmark.onnx");
        if !model_path.exists() {
            return Err(format!("Face landmark model not found: {:?}", model_path));
        }

        ort::init()
            .with_name("LipstickTryOn")
            .commit()
            .map_err(|e| format!("Failed to initialize ORT: {}", e))?;

        let session = ort::session::Session::builder()
            .map_err(|e| format!("Failed to create session builder: {}", e))?
            .with_intra_threads(2)
            .map_err(|e| format!("Failed to set threads: {}", e))?
            .commit_from_file(&model_path)
            .map_err(|e| format!("Failed to load face landmark model: {}", e))?;

        log::info!("Loaded face landmark model from {:?}", model_path);

        Ok(Self {
            session,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
        })
    }

    /// Find the models directory, trying next to the executable first and
    /// then the working directory (for cargo run).
    fn find_model_dir() -> Result<PathBuf, String> {
        if let Ok(exe_path) = std::env::current_exe() {
            let mut dir = exe_path.parent().map(PathBuf::from);
            while let Some(parent) = dir {
                let model_dir = parent.join("models");
                if model_dir.exists() {
                    return Ok(model_dir);
                }
                dir = parent.parent().map(PathBuf::from);
            }
        }

        let cwd = std::env::current_dir().map_err(|e| e.to_string())?;
        let model_dir = cwd.join("models");
        if model_dir.exists() {
            return Ok(model_dir);
        }

        Err("Models directory not found. Create a 'models' directory with ONNX models.".to_string())
    }
}

impl DetectorBackend for FaceMeshModel {
    fn detect(&mut self, frame: &RgbaImage) -> Result<Option<LandmarkSet>, DetectError> {
        let input = preprocess_nhwc(frame, INPUT_WIDTH, INPUT_HEIGHT);

        let input_array = Array4::from_shape_vec(
            (1, INPUT_HEIGHT as usize, INPUT_WIDTH as usize, 3),
            input,
        )
        .map_err(|e| DetectError::Backend(format!("Failed to create input array: {}", e)))?;

        let input_tensor = ort::value::Tensor::from_array(input_array)
            .map_err(|e| DetectError::Backend(format!("Failed to create tensor: {}", e)))?;

        let outputs = self
            .session
            .run(ort::inputs![input_tensor])
            .map_err(|e| DetectError::Backend(format!("Inference failed: {}", e)))?;

        // The model has two outputs: the landmark coordinates (one large
        // tensor) and a face-presence logit (a single scalar). Telling
        // them apart by size is robust to output naming differences
        // between model zoo exports.
        let mut landmarks: Option<Vec<f32>> = None;
        let mut score: Option<f32> = None;
        for output in outputs.iter() {
            let (_shape, data) = output
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| DetectError::Backend(format!("Failed to extract output: {}", e)))?;
            if data.len() >= 3 {
                landmarks = Some(data.to_vec());
            } else if let Some(&v) = data.first() {
                score = Some(v);
            }
        }

        let landmarks =
            landmarks.ok_or_else(|| DetectError::Backend("No landmark output".to_string()))?;

        if let Some(logit) = score {
            if sigmoid(logit) < self.confidence_threshold {
                return Ok(None);
            }
        }

        Ok(Some(decode_landmarks(
            &landmarks,
            frame.width(),
            frame.height(),
        )))
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Resize to the model's input size and convert to RGB float HWC in
/// [0, 1].
fn preprocess_nhwc(frame: &RgbaImage, target_width: u32, target_height: u32) -> Vec<f32> {
    let mut output = vec![0.0f32; (target_width * target_height * 3) as usize];
    if frame.width() == 0 || frame.height() == 0 {
        return output;
    }

    let x_ratio = frame.width() as f32 / target_width as f32;
    let y_ratio = frame.height() as f32 / target_height as f32;

    for y in 0..target_height {
        for x in 0..target_width {
            let src_x = ((x as f32 * x_ratio) as u32).min(frame.width() - 1);
            let src_y = ((y as f32 * y_ratio) as u32).min(frame.height() - 1);
            let px = frame.get_pixel(src_x, src_y).0;

            let out_idx = ((y * target_width + x) * 3) as usize;
            output[out_idx] = px[0] as f32 / 255.0;
            output[out_idx + 1] = px[1] as f32 / 255.0;
            output[out_idx + 2] = px[2] as f32 / 255.0;
        }
    }

    output
}

/// Decode flat `[x, y, z, ...]` landmark output (in model input-pixel
/// space) into source-frame pixel coordinates.
fn decode_landmarks(raw: &[f32], frame_width: u32, frame_height: u32) -> LandmarkSet {
    let x_scale = frame_width as f32 / INPUT_WIDTH as f32;
    let y_scale = frame_height as f32 / INPUT_HEIGHT as f32;

    let points = raw
        .chunks_exact(3)
        .map(|xyz| SourcePoint {
            x: xyz[0] * x_scale,
            y: xyz[1] * y_scale,
            // Depth stays proportional to the horizontal scale.
            z: xyz[2] * x_scale,
        })
        .collect();

    LandmarkSet::from_points(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_range() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }

    #[test]
    fn test_preprocess_normalizes_and_orders_hwc() {
        let mut frame = RgbaImage::new(2, 2);
        frame.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        frame.put_pixel(1, 0, image::Rgba([0, 255, 0, 255]));
        frame.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
        frame.put_pixel(1, 1, image::Rgba([255, 255, 255, 255]));

        let out = preprocess_nhwc(&frame, 2, 2);
        assert_eq!(out.len(), 12);
        // Top-left pixel: pure red in HWC order.
        assert_eq!(&out[0..3], &[1.0, 0.0, 0.0]);
        // Top-right: pure green.
        assert_eq!(&out[3..6], &[0.0, 1.0, 0.0]);
        // Bottom-left: pure blue.
        assert_eq!(&out[6..9], &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_preprocess_output_size_matches_target() {
        let frame = RgbaImage::new(640, 480);
        let out = preprocess_nhwc(&frame, INPUT_WIDTH, INPUT_HEIGHT);
        assert_eq!(out.len(), (INPUT_WIDTH * INPUT_HEIGHT * 3) as usize);
    }

    #[test]
    fn test_decode_scales_to_source_pixels() {
        // One landmark at the center of the 192x192 input space.
        let raw = [96.0, 96.0, 4.0];
        let set = decode_landmarks(&raw, 640, 480);
        assert_eq!(set.len(), 1);
        let p = set.get(0).unwrap();
        assert!((p.x - 320.0).abs() < 1e-3);
        assert!((p.y - 240.0).abs() < 1e-3);
        assert!((p.z - 4.0 * (640.0 / 192.0)).abs() < 1e-3);
    }

    #[test]
    fn test_decode_ignores_trailing_partial_triplet() {
        let raw = [0.0, 0.0, 0.0, 1.0, 1.0];
        let set = decode_landmarks(&raw, 192, 192);
        assert_eq!(set.len(), 1);
    }
}
