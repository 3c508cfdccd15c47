//! Single reframe job execution.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn, Instrument};

use reframe_media::reframe::{FaceDetector, FaceLocator, SeetaFaceDetector};
use reframe_media::{FrameCropPipeline, ReframeOutcome};
use reframe_models::ReframeRequest;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;

/// Run one request end to end with the SeetaFace backend.
pub async fn run_job(config: &WorkerConfig, request: ReframeRequest) -> WorkerResult<ReframeOutcome> {
    request.validate(Some(config.max_clip_seconds))?;
    let backend = SeetaFaceDetector::load(&config.reframe.locator)?;
    run_job_with(config, request, Box::new(backend)).await
}

/// Run one request with the given detection backend.
///
/// The work directory is removed on every path. On failure the output file
/// is deleted, since the encoder may have left a truncated file behind.
pub async fn run_job_with(
    config: &WorkerConfig,
    request: ReframeRequest,
    backend: Box<dyn FaceDetector>,
) -> WorkerResult<ReframeOutcome> {
    let logger = JobLogger::new(&request.job_id, "reframe");
    let span = logger.create_span();
    execute(config, request, backend, &logger).instrument(span).await
}

async fn execute(
    config: &WorkerConfig,
    request: ReframeRequest,
    backend: Box<dyn FaceDetector>,
    logger: &JobLogger,
) -> WorkerResult<ReframeOutcome> {
    request.validate(Some(config.max_clip_seconds))?;

    let mut reframe = config.reframe.clone();
    reframe.pipeline = request.pipeline.clone();
    reframe.validate()?;

    let output = prepare_output(&request, &config.output_dir).await?;
    let work_dir = create_work_dir(config.work_dir.as_deref())?;
    logger.log_start(&format!(
        "{} [{}] -> {}",
        request.input_path.display(),
        request.range,
        output.display()
    ));
    logger.log_progress(&format!(
        "{} smoothing, detection every {} frame(s), {}x{} output",
        reframe.pipeline.smoothing,
        reframe.pipeline.detection_interval,
        reframe.pipeline.output_width,
        reframe.pipeline.output_height
    ));

    let locator = FaceLocator::new(backend, &reframe.locator);
    let mut pipeline = FrameCropPipeline::new(reframe, locator);
    let result = pipeline
        .run(&request.input_path, request.range, &output, work_dir.path())
        .await;

    let work_path = work_dir.path().to_path_buf();
    if let Err(e) = work_dir.close() {
        logger.log_warning(&format!(
            "failed to remove work directory {}: {}",
            work_path.display(),
            e
        ));
    }

    match result {
        Ok(outcome) => {
            if !outcome.audio_included {
                logger.log_warning("segment has no usable audio, output is silent");
            }
            logger.log_completion(&format!(
                "{} frames, {} detection passes, {} with a face",
                outcome.frames_written, outcome.detection_passes, outcome.faces_found
            ));
            Ok(outcome)
        }
        Err(e) => {
            logger.log_error(&e.to_string());
            discard_partial_output(&output).await;
            Err(e.into())
        }
    }
}

/// Resolve the output path and make sure its directory exists.
pub async fn prepare_output(request: &ReframeRequest, output_dir: &Path) -> WorkerResult<PathBuf> {
    let output = request.resolve_output_path(output_dir);
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(output)
}

/// Per-job scratch directory for the subclip and audio files.
pub fn create_work_dir(base: Option<&Path>) -> WorkerResult<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("reframe-");
    let dir = match base {
        Some(base) => {
            std::fs::create_dir_all(base)?;
            builder.tempdir_in(base)?
        }
        None => builder.tempdir()?,
    };
    debug!("Work directory: {}", dir.path().display());
    Ok(dir)
}

/// Delete a possibly truncated output file.
pub async fn discard_partial_output(output: &Path) -> bool {
    match tokio::fs::remove_file(output).await {
        Ok(()) => {
            warn!("Removed partial output {}", output.display());
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Failed to remove partial output {}: {}", output.display(), e);
            false
        }
    }
}
