//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while extracting, decoding, detecting or encoding.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Encode failed after {frames_written} frames: {message}")]
    EncodeFailure {
        message: String,
        frames_written: u64,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },

    #[error("Decode failed: {0}")]
    DecodeFailure(String),

    #[error("No usable audio track: {0}")]
    MissingAudio(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Face detection failed: {0}")]
    DetectionFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),
}

impl MediaError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an encode failure carrying the number of frames already written.
    pub fn encode_failure(
        message: impl Into<String>,
        frames_written: u64,
        exit_code: Option<i32>,
        stderr: Option<String>,
    ) -> Self {
        Self::EncodeFailure {
            message: message.into(),
            frames_written,
            exit_code,
            stderr,
        }
    }

    pub fn decode_failure(message: impl Into<String>) -> Self {
        Self::DecodeFailure(message.into())
    }

    pub fn missing_audio(message: impl Into<String>) -> Self {
        Self::MissingAudio(message.into())
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Whether the error must abort a run. Only a missing audio track
    /// degrades gracefully.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::MissingAudio(_))
    }

    /// Frames written before an encode failure, if known.
    pub fn frames_written(&self) -> Option<u64> {
        match self {
            Self::EncodeFailure { frames_written, .. } => Some(*frames_written),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_audio_is_not_fatal() {
        assert!(!MediaError::missing_audio("no stream").is_fatal());
        assert!(MediaError::decode_failure("eof").is_fatal());
        assert!(MediaError::validation("bad range").is_fatal());
    }

    #[test]
    fn test_encode_failure_reports_frame_count() {
        let err = MediaError::encode_failure("pipe broken", 42, Some(1), None);
        assert_eq!(err.frames_written(), Some(42));
        assert!(err.to_string().contains("after 42 frames"));
        assert_eq!(MediaError::FfmpegNotFound.frames_written(), None);
    }
}
