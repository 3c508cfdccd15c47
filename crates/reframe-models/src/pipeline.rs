//! Per-run pipeline configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::aspect::AspectRatio;
use crate::encoding::EncodingConfig;
use crate::smoothing::SmoothingMethod;

/// Default frames between detection passes.
pub const DEFAULT_DETECTION_INTERVAL: u32 = 3;
/// Default output width (1080x1920 vertical).
pub const DEFAULT_OUTPUT_WIDTH: u32 = 1080;
/// Default output height.
pub const DEFAULT_OUTPUT_HEIGHT: u32 = 1920;

/// Options fixed for the lifetime of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct PipelineConfig {
    /// Smoothing strategy applied to both axes.
    #[serde(default)]
    pub smoothing: SmoothingMethod,

    /// Frames between detection passes (1 = detect every frame).
    #[serde(default = "default_detection_interval")]
    #[validate(range(min = 1, max = 300))]
    pub detection_interval: u32,

    /// Output width in pixels.
    #[serde(default = "default_output_width")]
    #[validate(range(min = 2, max = 8192))]
    pub output_width: u32,

    /// Output height in pixels.
    #[serde(default = "default_output_height")]
    #[validate(range(min = 2, max = 8192))]
    pub output_height: u32,

    /// Aspect ratio of the crop window taken from the source.
    #[serde(default)]
    pub aspect_ratio: AspectRatio,

    #[serde(default)]
    #[validate(nested)]
    pub encoding: EncodingConfig,
}

fn default_detection_interval() -> u32 {
    DEFAULT_DETECTION_INTERVAL
}
fn default_output_width() -> u32 {
    DEFAULT_OUTPUT_WIDTH
}
fn default_output_height() -> u32 {
    DEFAULT_OUTPUT_HEIGHT
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            smoothing: SmoothingMethod::default(),
            detection_interval: DEFAULT_DETECTION_INTERVAL,
            output_width: DEFAULT_OUTPUT_WIDTH,
            output_height: DEFAULT_OUTPUT_HEIGHT,
            aspect_ratio: AspectRatio::default(),
            encoding: EncodingConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_smoothing(mut self, smoothing: SmoothingMethod) -> Self {
        self.smoothing = smoothing;
        self
    }

    pub fn with_detection_interval(mut self, interval: u32) -> Self {
        self.detection_interval = interval;
        self
    }

    pub fn with_output_size(mut self, width: u32, height: u32) -> Self {
        self.output_width = width;
        self.output_height = height;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    /// Whether the output resolution has even dimensions, which yuv420p
    /// encoders expect.
    pub fn has_even_output(&self) -> bool {
        self.output_width % 2 == 0 && self.output_height % 2 == 0
    }
}
