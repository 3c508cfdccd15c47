//! Shared data models for the reframe pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Pipeline configuration (smoothing method, detection interval, output size)
//! - Target aspect ratios
//! - Encoding configuration handed to FFmpeg
//! - Reframe requests and time ranges

pub mod aspect;
pub mod encoding;
pub mod job;
pub mod pipeline;
pub mod smoothing;
pub mod timestamp;

// Re-export common types
pub use aspect::{AspectRatio, AspectRatioParseError};
pub use encoding::EncodingConfig;
pub use job::{JobId, ReframeRequest, RequestError};
pub use pipeline::PipelineConfig;
pub use smoothing::{SmoothingMethod, SmoothingMethodParseError};
pub use timestamp::{format_seconds, parse_timestamp, TimeRange, TimestampError};
