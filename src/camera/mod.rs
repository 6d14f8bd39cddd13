//! Camera capture.
//!
//! Cross-platform capture via nokhwa. A background thread decodes frames
//! into RGBA and publishes them through a triple buffer; the render thread
//! grabs the latest complete frame without ever blocking the capture loop.
//! Frame dimensions travel with each frame because a device can
//! renegotiate its format after the stream starts.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use image::RgbaImage;
use nokhwa::pixel_format::RgbAFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;
use parking_lot::Mutex;

use crate::tryon::transform::{CoverTransform, DisplayPoint};

/// One decoded camera frame.
#[derive(Clone)]
pub struct CameraFrame {
    /// RGBA pixel data, `width * height * 4` bytes.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub frame_number: u64,
    pub timestamp: Instant,
}

impl CameraFrame {
    /// View the frame as an image for the detector. Returns `None` if the
    /// buffer length does not match the advertised dimensions.
    pub fn to_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
    }

    /// Resample the frame into an `out_width x out_height` RGBA buffer
    /// under the cover-fit mapping, optionally mirrored (selfie view).
    /// Returns `None` while any dimension is zero.
    pub fn cover_resample(&self, out_width: u32, out_height: u32, mirror: bool) -> Option<Vec<u8>> {
        let transform = CoverTransform::compute(self.width, self.height, out_width, out_height)?;
        let mut output = vec![0u8; (out_width * out_height * 4) as usize];

        for y in 0..out_height {
            for x in 0..out_width {
                let display_x = if mirror {
                    out_width as f32 - (x as f32 + 0.5)
                } else {
                    x as f32 + 0.5
                };
                let src = transform.unproject(DisplayPoint::new(display_x, y as f32 + 0.5));
                let src_x = (src.x as u32).min(self.width - 1);
                let src_y = (src.y as u32).min(self.height - 1);
                let src_idx = ((src_y * self.width + src_x) * 4) as usize;
                let dst_idx = ((y * out_width + x) * 4) as usize;
                output[dst_idx..dst_idx + 4].copy_from_slice(&self.data[src_idx..src_idx + 4]);
            }
        }

        Some(output)
    }
}

/// Information about an available camera.
#[derive(Clone, Debug)]
pub struct CameraInfo {
    pub index: u32,
    pub name: String,
}

/// Camera capture interface.
pub struct CameraCapture {
    /// Latest frames, triple buffered.
    frames: [Arc<Mutex<Option<CameraFrame>>>; 3],
    latest_frame_idx: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    thread_handle: Option<std::thread::JoinHandle<()>>,
    frame_count: Arc<AtomicU64>,
}

impl CameraCapture {
    /// List available cameras.
    pub fn list_cameras() -> Vec<CameraInfo> {
        let mut cameras = Vec::new();

        match nokhwa::query(nokhwa::utils::ApiBackend::Auto) {
            Ok(camera_list) => {
                for (idx, info) in camera_list.iter().enumerate() {
                    cameras.push(CameraInfo {
                        index: idx as u32,
                        name: info.human_name().to_string(),
                    });
                }
            }
            Err(e) => {
                log::warn!("Failed to enumerate cameras: {:?}", e);
            }
        }

        cameras
    }

    /// Start capturing from `camera_index` on a background thread.
    pub fn new(camera_index: u32) -> Result<Self, String> {
        let frames: [Arc<Mutex<Option<CameraFrame>>>; 3] = [
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
            Arc::new(Mutex::new(None)),
        ];
        let latest_frame_idx = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));
        let frame_count = Arc::new(AtomicU64::new(0));

        let frames_clone = frames.clone();
        let latest_frame_idx_clone = latest_frame_idx.clone();
        let running_clone = running.clone();
        let frame_count_clone = frame_count.clone();

        let thread_handle = std::thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn(move || {
                Self::capture_thread(
                    camera_index,
                    frames_clone,
                    latest_frame_idx_clone,
                    running_clone,
                    frame_count_clone,
                );
            })
            .map_err(|e| format!("Failed to spawn capture thread: {}", e))?;

        Ok(Self {
            frames,
            latest_frame_idx,
            running,
            thread_handle: Some(thread_handle),
            frame_count,
        })
    }

    fn capture_thread(
        camera_index: u32,
        frames: [Arc<Mutex<Option<CameraFrame>>>; 3],
        latest_frame_idx: Arc<AtomicU64>,
        running: Arc<AtomicBool>,
        frame_count: Arc<AtomicU64>,
    ) {
        log::info!("Starting camera capture thread (camera {})", camera_index);

        let index = CameraIndex::Index(camera_index);

        // Prefer the highest resolution the device offers, falling back
        // to progressively looser format requests.
        let requested =
            RequestedFormat::new::<RgbAFormat>(RequestedFormatType::AbsoluteHighestResolution);

        let mut camera = match Camera::new(index.clone(), requested) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("Failed to open camera with highest resolution: {:?}", e);

                let requested2 = RequestedFormat::new::<RgbAFormat>(
                    RequestedFormatType::HighestResolution(nokhwa::utils::Resolution::new(
                        640, 480,
                    )),
                );

                match Camera::new(index.clone(), requested2) {
                    Ok(c) => c,
                    Err(e2) => {
                        log::warn!("Failed with HighestResolution: {:?}", e2);

                        let requested3 =
                            RequestedFormat::new::<RgbAFormat>(RequestedFormatType::None);
                        match Camera::new(index, requested3) {
                            Ok(c) => c,
                            Err(e3) => {
                                log::error!(
                                    "Failed to open camera with all format attempts: {:?}",
                                    e3
                                );
                                return;
                            }
                        }
                    }
                }
            }
        };

        if let Err(e) = camera.open_stream() {
            log::error!("Failed to open camera stream: {:?}", e);
            return;
        }

        log::info!(
            "Camera opened: {} ({}x{})",
            camera.info().human_name(),
            camera.resolution().width(),
            camera.resolution().height()
        );

        let mut write_idx: u64 = 0;

        while running.load(Ordering::Acquire) {
            match camera.frame() {
                Ok(frame) => match frame.decode_image::<RgbAFormat>() {
                    Ok(image) => {
                        let frame_num = frame_count.fetch_add(1, Ordering::Relaxed);

                        // Dimensions come from the decoded frame, not the
                        // negotiated format: the device may have changed
                        // its mind mid-stream.
                        let camera_frame = CameraFrame {
                            width: frame.resolution().width(),
                            height: frame.resolution().height(),
                            data: image.into_raw(),
                            frame_number: frame_num,
                            timestamp: Instant::now(),
                        };

                        let slot = (write_idx % 3) as usize;
                        *frames[slot].lock() = Some(camera_frame);

                        latest_frame_idx.store(write_idx, Ordering::Release);
                        write_idx = write_idx.wrapping_add(1);
                    }
                    Err(e) => {
                        log::warn!("Failed to decode frame: {:?}", e);
                    }
                },
                Err(e) => {
                    log::warn!("Failed to capture frame: {:?}", e);
                    std::thread::sleep(std::time::Duration::from_millis(10));
                }
            }
        }

        log::info!("Camera capture thread stopped");
    }

    /// Get the latest captured frame.
    pub fn latest_frame(&self) -> Option<CameraFrame> {
        let idx = self.latest_frame_idx.load(Ordering::Acquire);
        let slot = (idx % 3) as usize;
        self.frames[slot].lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    /// Stop capturing and release the device.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraCapture {
    fn drop(&mut self) {
        self.stop();
    }
}
