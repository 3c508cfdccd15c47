//! Per-frame vertical re-framing with face detection and smoothing.
//!
//! Every frame of a segment is decoded, cropped to a fixed-aspect window
//! that follows the primary face, and streamed into an FFmpeg encoder.
//! Memory stays bounded by the detection interval, not the clip length.
//!
//! # Architecture
//!
//! ```text
//! Source segment
//!     │
//!     ▼
//! ┌──────────────────┐
//! │   FrameSource    │ ← ffmpeg → raw RGB24, one frame at a time
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   FaceLocator    │ ← every Nth frame, primary face only
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │PositionEstimator │ ← Kalman or EMA, freeze then drift on misses
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   CropGeometry   │ ← clamp a fixed-size window into the frame
//! └────────┬─────────┘
//!          │  skipped frames: interpolated windows
//!          ▼
//! ┌──────────────────┐
//! │  StreamEncoder   │ ← raw RGB24 → ffmpeg stdin, audio remux
//! └────────┬─────────┘
//!          │
//!          ▼
//!    Output Video
//! ```

pub mod config;
pub mod encoder;
pub mod estimator;
pub mod frame;
pub mod geometry;
pub mod locator;
pub mod models;
pub mod pipeline;
pub mod seeta;
pub mod source;


pub use config::{LocatorSettings, ModelVariant, ReframeConfig, SmootherSettings};
pub use encoder::{EncoderSpec, FrameSink, StreamEncoder};
pub use estimator::{AxisFilter, EmaFilter, KalmanFilter1D, PositionEstimator};
pub use frame::{crop_frame, Frame};
pub use geometry::CropGeometry;
pub use locator::{select_primary, FaceBox, FaceDetector, FaceLocator, RawFace};
pub use models::{CropWindow, Detection};
pub use pipeline::{FrameCropPipeline, PipelineState, ReframeOutcome, StreamStats};
pub use seeta::SeetaFaceDetector;
pub use source::{FrameSource, FrameStream};
