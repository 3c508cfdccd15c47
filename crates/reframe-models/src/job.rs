//! Reframe request model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::pipeline::PipelineConfig;
use crate::timestamp::{TimeRange, TimestampError};

/// Unique job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 characters, used for short file names.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One reframe job: a segment of a source video plus the pipeline options.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReframeRequest {
    #[serde(default)]
    pub job_id: JobId,

    /// Source video file.
    pub input_path: PathBuf,

    /// Segment to reframe.
    pub range: TimeRange,

    /// Explicit output path; generated when absent.
    #[serde(default)]
    pub output_path: Option<PathBuf>,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl ReframeRequest {
    pub fn new(input_path: impl Into<PathBuf>, range: TimeRange) -> Self {
        Self {
            job_id: JobId::new(),
            input_path: input_path.into(),
            range,
            output_path: None,
            pipeline: PipelineConfig::default(),
        }
    }

    pub fn with_output(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(output_path.into());
        self
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Output path, or `{output_dir}/short_{job8}.mp4` when none was given.
    pub fn resolve_output_path(&self, output_dir: &Path) -> PathBuf {
        self.output_path
            .clone()
            .unwrap_or_else(|| output_dir.join(format!("short_{}.mp4", self.job_id.short())))
    }

    /// Validate everything that can be checked before any resource is acquired.
    pub fn validate(&self, max_clip_secs: Option<f64>) -> Result<(), RequestError> {
        if !self.input_path.is_file() {
            return Err(RequestError::InputNotFound(self.input_path.clone()));
        }
        // Re-check: deserialized ranges bypass TimeRange::new.
        TimeRange::new(self.range.start, self.range.end)?;
        if let Some(max) = max_clip_secs {
            self.range.ensure_max_duration(max)?;
        }
        self.pipeline.validate()?;
        Ok(())
    }
}

/// Request validation failure.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Input video not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Invalid time range: {0}")]
    TimeRange(#[from] TimestampError),

    #[error("Invalid pipeline config: {0}")]
    Config(#[from] ValidationErrors),
}
