//! Configuration for the reframe pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use reframe_models::PipelineConfig;

use crate::error::{MediaError, MediaResult};

/// Default SeetaFace model location, relative to the working directory.
pub const DEFAULT_MODEL_PATH: &str = "models/seeta_fd_frontal_v1.0.bin";

/// Tunables of the position estimator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SmootherSettings {
    /// Kalman process noise; lower is smoother but slower to react (default: 1e-3)
    pub process_noise: f64,

    /// Kalman measurement noise; higher trusts the motion model more (default: 1e-1)
    pub measurement_noise: f64,

    /// EMA weight of the newest measurement, in (0, 1] (default: 0.15)
    pub ema_alpha: f64,

    /// Missed detection passes tolerated before drifting to the frame center (default: 10)
    pub freeze_threshold: u32,
}

impl Default for SmootherSettings {
    fn default() -> Self {
        Self {
            process_noise: 1e-3,
            measurement_noise: 1e-1,
            ema_alpha: 0.15,
            freeze_threshold: 10,
        }
    }
}

impl SmootherSettings {
    pub fn validate(&self) -> MediaResult<()> {
        if !(self.process_noise.is_finite() && self.process_noise > 0.0) {
            return Err(MediaError::validation("process_noise must be positive"));
        }
        if !(self.measurement_noise.is_finite() && self.measurement_noise > 0.0) {
            return Err(MediaError::validation("measurement_noise must be positive"));
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(MediaError::validation("ema_alpha must be in (0, 1]"));
        }
        Ok(())
    }
}

/// Detection model variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// Close-up faces (talking heads within a couple of meters).
    ShortRange,
    /// Smaller, more distant faces.
    #[default]
    FullRange,
}

impl ModelVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::ShortRange => "short_range",
            ModelVariant::FullRange => "full_range",
        }
    }

    /// Smallest face side, in pixels, the detector searches for.
    pub fn min_face_size(&self) -> u32 {
        match self {
            ModelVariant::ShortRange => 80,
            ModelVariant::FullRange => 40,
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ModelVariant {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "short_range" | "short" | "0" => Ok(ModelVariant::ShortRange),
            "full_range" | "full" | "1" => Ok(ModelVariant::FullRange),
            other => Err(MediaError::validation(format!("unknown model variant: {}", other))),
        }
    }
}

/// Settings of the face-detection capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorSettings {
    /// Minimum confidence for a detection to count (default: 0.5)
    pub min_confidence: f64,

    pub model_variant: ModelVariant,

    /// Path to the detector model file
    pub model_path: PathBuf,

    /// Prefer centered faces when several are found (default: true)
    pub center_bias: bool,
}

impl Default for LocatorSettings {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            model_variant: ModelVariant::default(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            center_bias: true,
        }
    }
}

/// Everything one reframe run needs besides its input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReframeConfig {
    pub pipeline: PipelineConfig,
    pub smoother: SmootherSettings,
    pub locator: LocatorSettings,

    /// Timeout for one-shot FFmpeg calls (subclip and audio extraction)
    pub ffmpeg_timeout_secs: Option<u64>,
}

impl ReframeConfig {
    pub fn new(pipeline: PipelineConfig) -> Self {
        Self {
            pipeline,
            ..Default::default()
        }
    }

    /// Check everything that can fail before resources are acquired.
    pub fn validate(&self) -> MediaResult<()> {
        use validator::Validate;

        self.pipeline
            .validate()
            .map_err(|e| MediaError::validation(format!("pipeline config: {}", e)))?;
        self.smoother.validate()?;
        if !(0.0..=1.0).contains(&self.locator.min_confidence) {
            return Err(MediaError::validation("min_confidence must be in [0, 1]"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ReframeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.smoother.freeze_threshold, 10);
        assert_eq!(config.smoother.ema_alpha, 0.15);
        assert_eq!(config.locator.min_confidence, 0.5);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = ReframeConfig::default();
        config.smoother.ema_alpha = 0.0;
        assert!(matches!(config.validate(), Err(MediaError::Validation(_))));

        let mut config = ReframeConfig::default();
        config.locator.min_confidence = 1.5;
        assert!(config.validate().is_err());

        let mut config = ReframeConfig::default();
        config.pipeline.detection_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_model_variant_parse() {
        assert_eq!("short".parse::<ModelVariant>().unwrap(), ModelVariant::ShortRange);
        assert_eq!("1".parse::<ModelVariant>().unwrap(), ModelVariant::FullRange);
        assert!("medium".parse::<ModelVariant>().is_err());
        assert!(ModelVariant::ShortRange.min_face_size() > ModelVariant::FullRange.min_face_size());
    }
}
