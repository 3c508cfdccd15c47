#![deny(unreachable_patterns)]
//! FFmpeg-backed media layer for vertical reframing.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and execution
//! - Video metadata probing via ffprobe
//! - Stream-copy subclip and audio extraction
//! - Per-frame reframing: face detection, position smoothing, crop
//!   geometry and streaming encode (see [`reframe`])

pub mod clip;
pub mod command;
pub mod error;
pub mod metrics;
pub mod probe;
pub mod reframe;

pub use clip::{extract_audio, extract_subclip};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use probe::{probe_video, VideoMetadata};
pub use reframe::{FrameCropPipeline, PipelineState, ReframeConfig, ReframeOutcome};
