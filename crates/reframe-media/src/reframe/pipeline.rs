//! Frame crop pipeline: extraction, per-frame detection, interpolation, encoding.
//!
//! States move `Idle -> SubclipReady -> Streaming -> Finalizing -> Completed`;
//! any unrecoverable error moves to `Failed`. Detection runs on every
//! `detection_interval`-th frame. Frames in between are buffered and cropped
//! once the next detected window is known, with windows linearly interpolated
//! between the two detected ones. Whatever is left at end of stream is cropped
//! with the last window.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use reframe_models::TimeRange;

use super::config::ReframeConfig;
use super::encoder::{EncoderSpec, FrameSink, StreamEncoder};
use super::estimator::PositionEstimator;
use super::frame::{crop_frame, Frame};
use super::geometry::CropGeometry;
use super::locator::FaceLocator;
use super::models::{CropWindow, Detection};
use super::source::{FrameSource, FrameStream};
use crate::clip::{extract_audio, extract_subclip};
use crate::command::FfmpegRunner;
use crate::error::{MediaError, MediaResult};
use crate::metrics;
use crate::probe::probe_video;

/// File names inside the caller's work directory.
const SUBCLIP_FILE: &str = "subclip.mp4";
const AUDIO_FILE: &str = "audio.aac";

/// Lifecycle of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    SubclipReady,
    Streaming,
    Finalizing,
    Completed,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::SubclipReady => "subclip_ready",
            PipelineState::Streaming => "streaming",
            PipelineState::Finalizing => "finalizing",
            PipelineState::Completed => "completed",
            PipelineState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Counters of one streaming pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StreamStats {
    pub frames_decoded: u64,
    pub frames_written: u64,
    pub detection_passes: u64,
    pub faces_found: u64,
    /// Fixed crop size of the run.
    pub crop_size: (u32, u32),
    /// Window of the last emitted frame.
    pub last_window: Option<CropWindow>,
    /// Time from the start of the run to the end of finalization.
    pub elapsed: Duration,
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct ReframeOutcome {
    pub output_path: PathBuf,
    pub frames_written: u64,
    pub detection_passes: u64,
    pub faces_found: u64,
    pub crop_size: (u32, u32),
    pub audio_included: bool,
    pub elapsed: Duration,
}

/// Intermediate files produced by segment extraction.
#[derive(Debug, Clone)]
pub struct SegmentFiles {
    pub subclip: PathBuf,
    pub audio: Option<PathBuf>,
}

/// Re-frames one segment. One instance serves exactly one run.
pub struct FrameCropPipeline {
    config: ReframeConfig,
    locator: FaceLocator,
    runner: FfmpegRunner,
    state: PipelineState,
}

impl FrameCropPipeline {
    pub fn new(config: ReframeConfig, locator: FaceLocator) -> Self {
        let runner = match config.ffmpeg_timeout_secs {
            Some(secs) => FfmpegRunner::new().with_timeout(secs),
            None => FfmpegRunner::new(),
        };
        Self {
            config,
            locator,
            runner,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn config(&self) -> &ReframeConfig {
        &self.config
    }

    pub fn locator(&self) -> &FaceLocator {
        &self.locator
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline state {} -> {}", self.state, next);
        self.state = next;
    }

    /// Release the locator and mark the run failed.
    fn fail(&mut self, err: MediaError, started: Instant, frames: u64) -> MediaError {
        if let Err(e) = self.locator.close() {
            warn!("Failed to release face locator: {}", e);
        }
        self.transition(PipelineState::Failed);
        metrics::record_run("failed", frames, started.elapsed().as_secs_f64());
        err
    }

    /// Run the whole pipeline: extract `range` of `input` into `work_dir`,
    /// stream it through detection and cropping, and encode to `output`.
    ///
    /// Files in `work_dir` are left for the caller to remove. On error the
    /// output file, if any, is incomplete.
    #[instrument(skip_all, fields(input = %input.display(), start = range.start, end = range.end))]
    pub async fn run(
        &mut self,
        input: &Path,
        range: TimeRange,
        output: &Path,
        work_dir: &Path,
    ) -> MediaResult<ReframeOutcome> {
        let started = Instant::now();
        if self.state != PipelineState::Idle {
            return Err(MediaError::validation(format!(
                "pipeline already used (state: {})",
                self.state
            )));
        }
        if let Err(e) = self.validate_inputs(input, range) {
            return Err(self.fail(e, started, 0));
        }

        info!(
            "Reframing {} [{:.2}s..{:.2}s] -> {}",
            input.display(),
            range.start,
            range.end,
            output.display()
        );

        let segment = match self.extract_segment(input, range, work_dir).await {
            Ok(segment) => segment,
            Err(e) => return Err(self.fail(e, started, 0)),
        };
        self.transition(PipelineState::SubclipReady);

        let mut source = match FrameSource::open(&segment.subclip).await {
            Ok(source) => source,
            Err(e) => return Err(self.fail(e, started, 0)),
        };

        let geometry = match CropGeometry::new(
            source.metadata().width,
            source.metadata().height,
            self.config.pipeline.aspect_ratio,
        ) {
            Ok(geometry) => geometry,
            Err(e) => {
                let _ = source.close().await;
                return Err(self.fail(e, started, 0));
            }
        };
        let (crop_width, crop_height) = geometry.crop_size();

        let spec = EncoderSpec {
            input_width: crop_width,
            input_height: crop_height,
            frame_rate: source.metadata().frame_rate,
            output_width: self.config.pipeline.output_width,
            output_height: self.config.pipeline.output_height,
            audio: segment.audio.clone(),
            output: output.to_path_buf(),
            encoding: self.config.pipeline.encoding.clone(),
        };
        let mut encoder = match StreamEncoder::spawn(spec).await {
            Ok(encoder) => encoder,
            Err(e) => {
                let _ = source.close().await;
                return Err(self.fail(e, started, 0));
            }
        };

        let stats = self
            .process_stream_since(&mut source, &mut encoder, started)
            .await?;

        let outcome = ReframeOutcome {
            output_path: output.to_path_buf(),
            frames_written: stats.frames_written,
            detection_passes: stats.detection_passes,
            faces_found: stats.faces_found,
            crop_size: stats.crop_size,
            audio_included: segment.audio.is_some(),
            elapsed: stats.elapsed,
        };
        info!(
            frames = outcome.frames_written,
            detections = outcome.detection_passes,
            faces = outcome.faces_found,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "Reframe complete: {}",
            output.display()
        );
        Ok(outcome)
    }

    fn validate_inputs(&self, input: &Path, range: TimeRange) -> MediaResult<()> {
        self.config.validate()?;
        if !input.is_file() {
            return Err(MediaError::validation(format!(
                "input video not found: {}",
                input.display()
            )));
        }
        TimeRange::new(range.start, range.end)
            .map_err(|e| MediaError::validation(e.to_string()))?;
        Ok(())
    }

    /// Cut the subclip and, best-effort, its audio track.
    async fn extract_segment(
        &self,
        input: &Path,
        range: TimeRange,
        work_dir: &Path,
    ) -> MediaResult<SegmentFiles> {
        tokio::fs::create_dir_all(work_dir).await?;
        let subclip = extract_subclip(
            &self.runner,
            input,
            range.start,
            range.end,
            work_dir.join(SUBCLIP_FILE),
        )
        .await?;

        let has_audio = match probe_video(&subclip).await {
            Ok(meta) => meta.has_audio,
            Err(e) => {
                debug!("Probe before audio extraction failed: {}", e);
                true
            }
        };

        let audio = if has_audio {
            match extract_audio(&self.runner, &subclip, work_dir.join(AUDIO_FILE)).await {
                Ok(path) => Some(path),
                Err(e) if !e.is_fatal() => {
                    metrics::record_missing_audio();
                    warn!("Continuing without audio: {}", e);
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            metrics::record_missing_audio();
            warn!("Segment has no audio track, output will be silent");
            None
        };

        Ok(SegmentFiles { subclip, audio })
    }

    /// Stream every frame of `source` through detection and cropping into `sink`.
    ///
    /// Closes the source, the sink and the locator on every path. The sink is
    /// finalized on success and aborted on failure.
    pub async fn process_stream<S, K>(&mut self, source: &mut S, sink: &mut K) -> MediaResult<StreamStats>
    where
        S: FrameStream + ?Sized,
        K: FrameSink + ?Sized,
    {
        self.process_stream_since(source, sink, Instant::now()).await
    }

    /// [`process_stream`](Self::process_stream) for a run that began at
    /// `started`, so the recorded duration covers the whole run.
    pub async fn process_stream_since<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        started: Instant,
    ) -> MediaResult<StreamStats>
    where
        S: FrameStream + ?Sized,
        K: FrameSink + ?Sized,
    {
        if !matches!(self.state, PipelineState::Idle | PipelineState::SubclipReady) {
            return Err(MediaError::validation(format!(
                "cannot stream in state {}",
                self.state
            )));
        }
        self.transition(PipelineState::Streaming);

        let mut stats = StreamStats::default();
        let streamed = self.stream_frames(source, sink, &mut stats).await;
        let closed = source.close().await;

        if let Err(e) = streamed.and(closed) {
            sink.abort().await;
            return Err(self.fail(e, started, stats.frames_written));
        }

        self.transition(PipelineState::Finalizing);
        if let Err(e) = sink.close().await {
            return Err(self.fail(e, started, stats.frames_written));
        }

        if let Err(e) = self.locator.close() {
            warn!("Failed to release face locator: {}", e);
        }
        self.transition(PipelineState::Completed);
        stats.elapsed = started.elapsed();
        metrics::record_run("completed", stats.frames_written, stats.elapsed.as_secs_f64());
        Ok(stats)
    }

    async fn stream_frames<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        stats: &mut StreamStats,
    ) -> MediaResult<()>
    where
        S: FrameStream + ?Sized,
        K: FrameSink + ?Sized,
    {
        let (frame_width, frame_height) = source.dimensions();
        let geometry = CropGeometry::new(frame_width, frame_height, self.config.pipeline.aspect_ratio)?;
        stats.crop_size = geometry.crop_size();

        let mut estimator = PositionEstimator::new(
            self.config.pipeline.smoothing,
            self.config.smoother,
            geometry.frame_center(),
        );
        let interval = self.config.pipeline.detection_interval.max(1) as u64;
        let expected = source.frame_count();
        let mut pending: Vec<Frame> = Vec::with_capacity(interval as usize - 1);
        let mut last_window: Option<CropWindow> = None;
        let mut progress = ProgressLog::new(expected);

        info!(
            "Streaming {}x{} -> crop {}x{}, {} smoothing, detection every {} frame(s), ~{} frames",
            frame_width,
            frame_height,
            stats.crop_size.0,
            stats.crop_size.1,
            self.config.pipeline.smoothing,
            interval,
            expected
        );

        while let Some((index, frame)) = source.next_frame().await? {
            stats.frames_decoded += 1;

            if index % interval != 0 {
                pending.push(frame);
                continue;
            }

            let subject = self.locate(&frame);
            stats.detection_passes += 1;
            if subject.is_some() {
                stats.faces_found += 1;
            }

            let (cx, cy) = estimator.update(subject.map(|d| d.center()));
            let window = geometry.compute(cx, cy);
            let previous = last_window.unwrap_or(window);

            let buffered = pending.len();
            for (k, held) in pending.drain(..).enumerate() {
                let t = (k + 1) as f64 / (buffered + 1) as f64;
                emit(sink, &held, &CropWindow::lerp(&previous, &window, t), stats).await?;
            }
            emit(sink, &frame, &window, stats).await?;
            last_window = Some(window);

            progress.update(stats.frames_written);
        }

        if !pending.is_empty() {
            let window = last_window.unwrap_or_else(|| geometry.centered());
            debug!("Flushing {} buffered frame(s) with the last window", pending.len());
            for held in pending.drain(..) {
                emit(sink, &held, &window, stats).await?;
            }
        }

        if stats.frames_decoded == 0 {
            return Err(MediaError::decode_failure("no frames decoded from segment"));
        }
        debug_assert_eq!(stats.frames_decoded, stats.frames_written);
        Ok(())
    }

    /// Primary subject of `frame`. Detector errors count as "no face".
    fn locate(&mut self, frame: &Frame) -> Option<Detection> {
        match self.locator.get_primary(frame) {
            Ok(subject) => {
                metrics::record_detection(subject.is_some());
                subject
            }
            Err(e) => {
                warn!("Face detection failed, treating as no face: {}", e);
                metrics::record_detection_error(self.locator.backend_name());
                metrics::record_detection(false);
                None
            }
        }
    }
}

async fn emit<K>(sink: &mut K, frame: &Frame, window: &CropWindow, stats: &mut StreamStats) -> MediaResult<()>
where
    K: FrameSink + ?Sized,
{
    let cropped = crop_frame(frame, window)?;
    sink.write(&cropped).await?;
    stats.frames_written += 1;
    stats.last_window = Some(*window);
    Ok(())
}

/// Logs once per 10% of the expected frame count.
struct ProgressLog {
    expected: u64,
    last_decile: u64,
}

impl ProgressLog {
    fn new(expected: u64) -> Self {
        Self {
            expected,
            last_decile: 0,
        }
    }

    fn update(&mut self, written: u64) {
        if self.expected == 0 {
            return;
        }
        let decile = (written * 10 / self.expected).min(10);
        if decile > self.last_decile {
            self.last_decile = decile;
            info!(
                "Progress: {}% ({}/{} frames)",
                decile * 10,
                written,
                self.expected
            );
        }
    }
}
