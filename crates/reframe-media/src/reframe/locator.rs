//! Face location and primary-subject selection.
//!
//! [`FaceDetector`] is the swappable seam over an actual detection model.
//! [`FaceLocator`] wraps one for a run: it converts raw boxes to clamped
//! pixel [`Detection`]s, applies the confidence threshold, ranks by area,
//! and picks the primary subject.

use tracing::{debug, warn};

use super::config::LocatorSettings;
use super::frame::Frame;
use super::models::Detection;
use crate::error::{MediaError, MediaResult};

/// Weight of relative face area in the primary-subject score.
const AREA_WEIGHT: f64 = 0.7;
/// Weight of closeness to the frame center.
const CENTER_WEIGHT: f64 = 0.3;

/// Face box as reported by a backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaceBox {
    /// Pixel coordinates of the analyzed frame.
    Absolute { x: f64, y: f64, width: f64, height: f64 },
    /// Fractions of the frame size, in `[0, 1]`.
    Normalized { x: f64, y: f64, width: f64, height: f64 },
}

/// One face reported by a backend, before filtering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawFace {
    pub bbox: FaceBox,
    /// Confidence in `[0, 1]`.
    pub score: f64,
}

impl RawFace {
    pub fn absolute(x: f64, y: f64, width: f64, height: f64, score: f64) -> Self {
        Self {
            bbox: FaceBox::Absolute { x, y, width, height },
            score,
        }
    }

    pub fn normalized(x: f64, y: f64, width: f64, height: f64, score: f64) -> Self {
        Self {
            bbox: FaceBox::Normalized { x, y, width, height },
            score,
        }
    }

    /// Clamped pixel detection for a `frame_width x frame_height` frame.
    pub fn to_detection(&self, frame_width: u32, frame_height: u32) -> Option<Detection> {
        let (x, y, w, h) = match self.bbox {
            FaceBox::Absolute { x, y, width, height } => (x, y, width, height),
            FaceBox::Normalized { x, y, width, height } => {
                let fw = frame_width as f64;
                let fh = frame_height as f64;
                (x * fw, y * fh, width * fw, height * fh)
            }
        };
        Detection::clamped(x, y, w, h, self.score, frame_width, frame_height)
    }
}

/// A face-detection model.
///
/// Loaded once per run; `close` releases it. Runs are single-threaded, so
/// backends need not be `Send`.
#[cfg_attr(test, mockall::automock)]
pub trait FaceDetector {
    /// Detect faces in one frame, in any order.
    fn detect_faces(&mut self, frame: &Frame) -> MediaResult<Vec<RawFace>>;

    fn close(&mut self) -> MediaResult<()>;

    fn name(&self) -> &'static str;
}

/// Per-run face locator over a [`FaceDetector`].
pub struct FaceLocator {
    backend: Box<dyn FaceDetector>,
    min_confidence: f64,
    center_bias: bool,
    last_primary: Option<Detection>,
    closed: bool,
}

impl FaceLocator {
    pub fn new(backend: Box<dyn FaceDetector>, settings: &LocatorSettings) -> Self {
        debug!(
            backend = backend.name(),
            min_confidence = settings.min_confidence,
            "Face locator ready"
        );
        Self {
            backend,
            min_confidence: settings.min_confidence,
            center_bias: settings.center_bias,
            last_primary: None,
            closed: false,
        }
    }

    /// Detections in `frame`, largest first. Empty when nothing is found.
    pub fn detect(&mut self, frame: &Frame) -> MediaResult<Vec<Detection>> {
        if self.closed {
            return Err(MediaError::detection_failed("face locator is closed"));
        }

        let (width, height) = frame.dimensions();
        let mut detections: Vec<Detection> = self
            .backend
            .detect_faces(frame)?
            .iter()
            .filter(|face| face.score >= self.min_confidence)
            .filter_map(|face| face.to_detection(width, height))
            .collect();

        detections.sort_by(|a, b| b.area().cmp(&a.area()));
        Ok(detections)
    }

    /// The single subject to frame, or `None` when no face was found.
    pub fn get_primary(&mut self, frame: &Frame) -> MediaResult<Option<Detection>> {
        let detections = self.detect(frame)?;
        let (width, height) = frame.dimensions();
        let primary = if self.center_bias {
            select_primary(&detections, width, height)
        } else {
            detections.first().copied()
        };

        if let Some(detection) = primary {
            self.last_primary = Some(detection);
        }
        Ok(primary)
    }

    /// Most recent primary subject, kept across frames without detections.
    pub fn last_primary(&self) -> Option<&Detection> {
        self.last_primary.as_ref()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Release the detection model. Later calls are no-ops.
    pub fn close(&mut self) -> MediaResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.backend.close()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for FaceLocator {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.close() {
                warn!("Failed to release face detector: {}", e);
            }
        }
    }
}

/// Pick the subject scoring highest on `0.7 * relative area + 0.3 * centrality`.
///
/// Centrality is `1 - distance / half_diagonal`, measured from the face
/// center to the frame center.
pub fn select_primary(
    detections: &[Detection],
    frame_width: u32,
    frame_height: u32,
) -> Option<Detection> {
    match detections {
        [] => None,
        [only] => Some(*only),
        _ => {
            let max_area = detections.iter().map(Detection::area).max().unwrap_or(1).max(1) as f64;
            let fcx = frame_width as f64 / 2.0;
            let fcy = frame_height as f64 / 2.0;
            let half_diagonal = (fcx * fcx + fcy * fcy).sqrt().max(1.0);

            let score = |d: &Detection| {
                let (cx, cy) = d.center();
                let distance = ((cx - fcx).powi(2) + (cy - fcy).powi(2)).sqrt();
                AREA_WEIGHT * (d.area() as f64 / max_area)
                    + CENTER_WEIGHT * (1.0 - distance / half_diagonal)
            };

            detections
                .iter()
                .copied()
                .max_by(|a, b| score(a).total_cmp(&score(b)))
        }
    }
}
