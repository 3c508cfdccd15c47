//! SeetaFace detection backend (pure Rust, via `rustface`).

use image::imageops::{self, FilterType};
use std::path::Path;
use tracing::{debug, info};

use super::config::{LocatorSettings, ModelVariant};
use super::frame::Frame;
use super::locator::{FaceDetector, RawFace};
use crate::error::{MediaError, MediaResult};

/// Frames wider than this are downscaled before detection.
const ANALYSIS_WIDTH: u32 = 640;

/// Raw cascade score mapped to confidence 0.5.
const SCORE_MIDPOINT: f64 = 2.0;
/// Raw score units per logistic step.
const SCORE_SCALE: f64 = 2.0;

/// Face detector using the SeetaFace frontal cascade.
///
/// The cascade is built once at load time and reused for every pass.
pub struct SeetaFaceDetector {
    detector: Option<Box<dyn rustface::Detector>>,
    variant: ModelVariant,
    /// Analysis width the current minimum face size was set for.
    tuned_for: Option<(u32, u32)>,
}

impl SeetaFaceDetector {
    /// Load the model named by `settings.model_path`.
    pub fn load(settings: &LocatorSettings) -> MediaResult<Self> {
        Self::from_path(&settings.model_path, settings.model_variant)
    }

    pub fn from_path(path: &Path, variant: ModelVariant) -> MediaResult<Self> {
        if !path.is_file() {
            return Err(MediaError::model_not_found(path.display().to_string()));
        }
        let bytes = std::fs::read(path)?;
        let model = rustface::read_model(std::io::Cursor::new(bytes)).map_err(|e| {
            MediaError::model_not_found(format!("{} is not a SeetaFace model: {}", path.display(), e))
        })?;

        let mut detector = rustface::create_detector_with_model(model);
        detector.set_score_thresh(0.0);
        detector.set_pyramid_scale_factor(0.8);
        detector.set_slide_window_step(4, 4);

        info!("Loaded SeetaFace model from {} ({})", path.display(), variant);
        Ok(Self {
            detector: Some(detector),
            variant,
            tuned_for: None,
        })
    }
}

/// Minimum face size in analysis pixels for a variant's source-frame minimum.
pub fn analysis_min_face(variant: ModelVariant, frame_width: u32, analysis_width: u32) -> u32 {
    (variant.min_face_size() as u64 * analysis_width as u64 / frame_width.max(1) as u64).max(20) as u32
}

impl FaceDetector for SeetaFaceDetector {
    fn detect_faces(&mut self, frame: &Frame) -> MediaResult<Vec<RawFace>> {
        let detector = self
            .detector
            .as_mut()
            .ok_or_else(|| MediaError::detection_failed("SeetaFace model already released"))?;

        let (width, height) = frame.dimensions();
        let gray = if width > ANALYSIS_WIDTH {
            let scaled_height = ((height as u64 * ANALYSIS_WIDTH as u64) / width as u64).max(1) as u32;
            let small = imageops::resize(frame, ANALYSIS_WIDTH, scaled_height, FilterType::Triangle);
            imageops::grayscale(&small)
        } else {
            imageops::grayscale(frame)
        };
        let (gw, gh) = gray.dimensions();

        // Frame size is fixed within a run, so this is set once.
        if self.tuned_for != Some((width, gw)) {
            let min_face = analysis_min_face(self.variant, width, gw);
            detector.set_min_face_size(min_face);
            self.tuned_for = Some((width, gw));
            debug!(min_face, "SeetaFace tuned for {}x{} analysis frames", gw, gh);
        }

        let faces = detector.detect(&rustface::ImageData::new(gray.as_raw(), gw, gh));
        debug!(faces = faces.len(), "SeetaFace pass on {}x{}", gw, gh);

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                RawFace::normalized(
                    bbox.x() as f64 / gw as f64,
                    bbox.y() as f64 / gh as f64,
                    bbox.width() as f64 / gw as f64,
                    bbox.height() as f64 / gh as f64,
                    score_to_confidence(face.score()),
                )
            })
            .collect())
    }

    fn close(&mut self) -> MediaResult<()> {
        self.detector = None;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "seetaface"
    }
}

/// Map an unbounded cascade score to `[0, 1]` with a logistic curve.
pub fn score_to_confidence(score: f64) -> f64 {
    1.0 / (1.0 + (-(score - SCORE_MIDPOINT) / SCORE_SCALE).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_mapping() {
        assert!((score_to_confidence(SCORE_MIDPOINT) - 0.5).abs() < 1e-9);
        assert!(score_to_confidence(10.0) > 0.95);
        assert!(score_to_confidence(-5.0) < 0.05);
        assert!(score_to_confidence(3.0) > score_to_confidence(2.5));
    }

    #[test]
    fn test_analysis_min_face_scales_with_downscale() {
        let full = ModelVariant::FullRange.min_face_size();
        // No downscale: the source minimum applies as is, floored at 20.
        assert_eq!(analysis_min_face(ModelVariant::FullRange, 640, 640), full.max(20));
        // 1920 -> 640 shrinks faces threefold.
        assert_eq!(
            analysis_min_face(ModelVariant::FullRange, 1920, 640),
            (full / 3).max(20)
        );
        assert_eq!(analysis_min_face(ModelVariant::ShortRange, 1920, 640), 26);
    }

    #[test]
    fn test_missing_model_file() {
        let result = SeetaFaceDetector::from_path(Path::new("/nonexistent/model.bin"), ModelVariant::FullRange);
        assert!(matches!(result, Err(MediaError::ModelNotFound(_))));
    }
}
