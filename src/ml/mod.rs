//! Face-landmark detection plumbing.
//!
//! The actual model lives in [`face_mesh`]; this module owns the pieces
//! the frame loop talks to: the per-frame [`LandmarkSet`], the
//! [`DetectorBackend`] seam, and [`DetectorHandle`], which runs a backend
//! on its own thread with exactly one detection in flight.

pub mod face_mesh;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use image::RgbaImage;
use log::{info, warn};

use crate::tryon::transform::SourcePoint;

/// One frame's detected landmarks, indexed by face-mesh landmark id, in
/// source-frame pixel space.
#[derive(Clone, Debug, Default)]
pub struct LandmarkSet {
    points: Vec<SourcePoint>,
}

impl LandmarkSet {
    pub fn from_points(points: Vec<SourcePoint>) -> Self {
        Self { points }
    }

    /// Landmark by mesh index, `None` when the detector returned fewer
    /// points than the topology expects.
    pub fn get(&self, index: usize) -> Option<SourcePoint> {
        self.points.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Detection failures. All of these are per-frame conditions the loop
/// logs and shrugs off, never fatal.
#[derive(Debug)]
pub enum DetectError {
    /// The in-flight detection did not resolve within the deadline.
    Timeout,
    /// The worker thread is gone.
    WorkerGone,
    /// The underlying model raised an error for this frame.
    Backend(String),
}

impl fmt::Display for DetectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectError::Timeout => write!(f, "detection timed out"),
            DetectError::WorkerGone => write!(f, "detector worker thread has exited"),
            DetectError::Backend(msg) => write!(f, "detector backend error: {}", msg),
        }
    }
}

impl std::error::Error for DetectError {}

/// A detection backend: given a frame, return the first face's landmarks
/// (or `None` when no face is present).
pub trait DetectorBackend: Send {
    fn detect(&mut self, frame: &RgbaImage) -> Result<Option<LandmarkSet>, DetectError>;
}

struct DetectRequest {
    id: u64,
    frame: Arc<RgbaImage>,
}

struct DetectResponse {
    id: u64,
    result: Result<Option<LandmarkSet>, DetectError>,
}

/// Handle to a detector running on a dedicated worker thread.
///
/// At most one request is in flight. A request that misses its deadline
/// stays pending; its late response is drained and discarded on a later
/// call, so a slow model lowers the detection rate instead of queueing
/// work behind itself.
pub struct DetectorHandle {
    request_tx: Sender<DetectRequest>,
    response_rx: Receiver<DetectResponse>,
    next_id: u64,
    pending: Option<u64>,
    timeout: Duration,
}

impl DetectorHandle {
    /// Spawn the worker thread around a backend.
    pub fn spawn(
        mut backend: Box<dyn DetectorBackend>,
        timeout: Duration,
    ) -> std::io::Result<DetectorHandle> {
        let (request_tx, request_rx) = bounded::<DetectRequest>(1);
        let (response_tx, response_rx) = bounded::<DetectResponse>(1);

        std::thread::Builder::new()
            .name("landmark-detector".to_string())
            .spawn(move || {
                info!("landmark detector worker started");
                while let Ok(request) = request_rx.recv() {
                    let result = backend.detect(&request.frame);
                    if response_tx
                        .send(DetectResponse {
                            id: request.id,
                            result,
                        })
                        .is_err()
                    {
                        break;
                    }
                }
                info!("landmark detector worker stopped");
            })?;

        Ok(DetectorHandle {
            request_tx,
            response_rx,
            next_id: 0,
            pending: None,
            timeout,
        })
    }

    /// Run one detection for `frame`, waiting up to the configured
    /// timeout.
    ///
    /// If a previous request is still unresolved, its response (when
    /// already available) is returned for this frame rather than issuing
    /// a new request, keeping the single-in-flight invariant.
    pub fn detect(&mut self, frame: Arc<RgbaImage>) -> Result<Option<LandmarkSet>, DetectError> {
        if let Some(result) = self.drain_pending() {
            return result;
        }

        if self.pending.is_none() {
            let id = self.next_id;
            self.next_id += 1;
            if self.request_tx.try_send(DetectRequest { id, frame }).is_err() {
                return Err(DetectError::WorkerGone);
            }
            self.pending = Some(id);
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => {
                    if self.pending == Some(response.id) {
                        self.pending = None;
                        return response.result;
                    }
                    warn!("discarding stale detection response {}", response.id);
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                    return Err(DetectError::Timeout);
                }
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                    self.pending = None;
                    return Err(DetectError::WorkerGone);
                }
            }
        }
    }

    /// Drain already-arrived responses without blocking. Returns the
    /// pending request's result if it resolved while we were away.
    fn drain_pending(&mut self) -> Option<Result<Option<LandmarkSet>, DetectError>> {
        while let Ok(response) = self.response_rx.try_recv() {
            if self.pending == Some(response.id) {
                self.pending = None;
                return Some(response.result);
            }
            warn!("discarding stale detection response {}", response.id);
        }
        None
    }
}
