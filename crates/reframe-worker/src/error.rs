//! Worker error types.

use thiserror::Error;

use reframe_media::MediaError;
use reframe_models::RequestError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    Request(#[from] RequestError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the job was rejected before any work started.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Request(_) | Self::ConfigError(_) | Self::Media(MediaError::Validation(_))
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_rejections() {
        let err: WorkerError = RequestError::InputNotFound(PathBuf::from("a.mp4")).into();
        assert!(err.is_rejection());
        assert!(err.to_string().contains("a.mp4"));

        let err: WorkerError = MediaError::validation("bad interval").into();
        assert!(err.is_rejection());

        let err: WorkerError = MediaError::encode_failure("pipe closed", 12, Some(1), None).into();
        assert!(!err.is_rejection());
    }
}
