//! Streaming encoder over a persistent FFmpeg pipe.
//!
//! Cropped frames are written as raw RGB24 to the stdin of one FFmpeg
//! process per run, which scales them to the output resolution, encodes,
//! and optionally muxes a separate audio file. Pipe writes block when the
//! encoder falls behind.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use reframe_models::EncodingConfig;

use super::frame::{frame_len, Frame};
use crate::command::{check_ffmpeg, read_tail};
use crate::error::{MediaError, MediaResult};

/// Sequential consumer of cropped frames.
#[async_trait]
pub trait FrameSink: Send {
    /// Append one frame.
    async fn write(&mut self, frame: &Frame) -> MediaResult<()>;

    /// Signal end of input and wait for the output to be finalized.
    async fn close(&mut self) -> MediaResult<()>;

    /// Tear down without finalizing. The output is not valid afterwards.
    async fn abort(&mut self);

    fn frames_written(&self) -> u64;
}

/// Fixed parameters of one encode.
#[derive(Debug, Clone)]
pub struct EncoderSpec {
    /// Size of each incoming frame (the crop window size).
    pub input_width: u32,
    pub input_height: u32,
    /// Input frame rate as `(numerator, denominator)`.
    pub frame_rate: (u32, u32),
    pub output_width: u32,
    pub output_height: u32,
    /// Audio file to mux, if any.
    pub audio: Option<PathBuf>,
    pub output: PathBuf,
    pub encoding: EncodingConfig,
}

impl EncoderSpec {
    /// FFmpeg arguments for this encode.
    pub fn build_args(&self) -> Vec<String> {
        let (num, den) = self.frame_rate;
        let mut args = vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-vcodec".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{}x{}", self.input_width, self.input_height),
            "-r".to_string(),
            format!("{}/{}", num, den.max(1)),
            "-i".to_string(),
            "pipe:0".to_string(),
        ];

        if let Some(audio) = &self.audio {
            args.push("-i".to_string());
            args.push(audio.to_string_lossy().to_string());
            args.extend(["-map".to_string(), "0:v:0".to_string()]);
            args.extend(["-map".to_string(), "1:a:0".to_string()]);
        }

        args.push("-vf".to_string());
        args.push(format!("scale={}:{}", self.output_width, self.output_height));
        args.extend(self.encoding.to_ffmpeg_args(self.audio.is_some()));
        args.push(self.output.to_string_lossy().to_string());
        args
    }
}

/// Encoder process owning the output file for the duration of a run.
pub struct StreamEncoder {
    spec: EncoderSpec,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    frames_written: u64,
}

impl StreamEncoder {
    /// Spawn the encoder process.
    pub async fn spawn(spec: EncoderSpec) -> MediaResult<Self> {
        let ffmpeg = check_ffmpeg()?;
        Self::spawn_with(spec, Command::new(ffmpeg)).await
    }

    /// Spawn `command` as the encoder; it receives the encode arguments.
    pub async fn spawn_with(spec: EncoderSpec, mut command: Command) -> MediaResult<Self> {
        if let Some(parent) = spec.output.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let args = spec.build_args();
        debug!("Starting encoder: {:?} {}", command.as_std().get_program(), args.join(" "));

        let mut child = command
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                MediaError::encode_failure(format!("failed to spawn FFmpeg: {}", e), 0, None, None)
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::encode_failure("failed to open encoder stdin", 0, None, None))?;
        let stderr_task = child.stderr.take().map(|s| tokio::spawn(read_tail(s)));

        info!(
            "Encoder started: {}x{} -> {}x{} ({}){}",
            spec.input_width,
            spec.input_height,
            spec.output_width,
            spec.output_height,
            spec.output.display(),
            if spec.audio.is_some() { " with audio" } else { "" }
        );

        Ok(Self {
            spec,
            child: Some(child),
            stdin: Some(stdin),
            stderr_task,
            frames_written: 0,
        })
    }

    pub fn output(&self) -> &Path {
        &self.spec.output
    }

    /// Reap the process after the pipe broke and build the error.
    async fn fail(&mut self, message: String) -> MediaError {
        self.stdin = None;
        let exit_code = match self.child.take() {
            Some(mut child) => child.wait().await.ok().and_then(|s| s.code()),
            None => None,
        };
        let stderr = self.take_stderr().await;
        MediaError::encode_failure(message, self.frames_written, exit_code, stderr)
    }

    async fn take_stderr(&mut self) -> Option<String> {
        match self.stderr_task.take() {
            Some(handle) => handle.await.ok().filter(|s| !s.is_empty()),
            None => None,
        }
    }
}

#[async_trait]
impl FrameSink for StreamEncoder {
    async fn write(&mut self, frame: &Frame) -> MediaResult<()> {
        let expected = (self.spec.input_width, self.spec.input_height);
        if frame.dimensions() != expected {
            return Err(MediaError::validation(format!(
                "frame is {}x{}, encoder expects {}x{}",
                frame.width(),
                frame.height(),
                expected.0,
                expected.1
            )));
        }
        debug_assert_eq!(frame.as_raw().len(), frame_len(expected.0, expected.1));

        let Some(stdin) = self.stdin.as_mut() else {
            return Err(MediaError::encode_failure(
                "write after encoder was closed",
                self.frames_written,
                None,
                None,
            ));
        };

        if let Err(e) = stdin.write_all(frame.as_raw()).await {
            let err = self
                .fail(format!("pipe broken after {} frames: {}", self.frames_written, e))
                .await;
            return Err(err);
        }
        self.frames_written += 1;
        Ok(())
    }

    async fn close(&mut self) -> MediaResult<()> {
        if let Some(mut stdin) = self.stdin.take() {
            if let Err(e) = stdin.shutdown().await {
                debug!("Encoder stdin shutdown: {}", e);
            }
        }
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };

        let status = child.wait().await?;
        let stderr = self.take_stderr().await;
        if !status.success() {
            return Err(MediaError::encode_failure(
                format!("encoder exited with {:?}", status.code()),
                self.frames_written,
                status.code(),
                stderr,
            ));
        }

        info!(
            frames = self.frames_written,
            "Encoder finished: {}",
            self.spec.output.display()
        );
        Ok(())
    }

    async fn abort(&mut self) {
        self.stdin = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!("Failed to kill encoder: {}", e);
            }
        }
        self.take_stderr().await;
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(audio: Option<&str>) -> EncoderSpec {
        EncoderSpec {
            input_width: 608,
            input_height: 1080,
            frame_rate: (30000, 1001),
            output_width: 1080,
            output_height: 1920,
            audio: audio.map(PathBuf::from),
            output: PathBuf::from("/out/short.mp4"),
            encoding: EncodingConfig::default(),
        }
    }

    #[test]
    fn test_args_without_audio() {
        let args = spec(None).build_args().join(" ");
        assert!(args.contains("-f rawvideo -vcodec rawvideo -pix_fmt rgb24 -s 608x1080 -r 30000/1001 -i pipe:0"));
        assert!(args.contains("-vf scale=1080:1920"));
        assert!(args.contains("-c:v libx264"));
        assert!(args.contains("-pix_fmt yuv420p"));
        assert!(!args.contains("-c:a"));
        assert!(!args.contains("-shortest"));
        assert!(args.ends_with("/out/short.mp4"));
    }

    fn small_spec(dir: &Path, width: u32, height: u32) -> EncoderSpec {
        EncoderSpec {
            input_width: width,
            input_height: height,
            frame_rate: (30, 1),
            output_width: width,
            output_height: height,
            audio: None,
            output: dir.join("short.mp4"),
            encoding: EncodingConfig::default(),
        }
    }

    /// Shell standing in for the encoder; the encode arguments land in `$0..`.
    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    #[tokio::test]
    async fn test_encoder_finishes_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = StreamEncoder::spawn_with(small_spec(dir.path(), 8, 8), shell("cat >/dev/null"))
            .await
            .unwrap();

        for _ in 0..4 {
            encoder.write(&Frame::new(8, 8)).await.unwrap();
        }
        encoder.close().await.unwrap();
        assert_eq!(encoder.frames_written(), 4);
        encoder.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_encoder_exit_early_breaks_pipe() {
        let dir = tempfile::tempdir().unwrap();
        // One frame is larger than the pipe buffer, so the write cannot complete.
        let mut encoder = StreamEncoder::spawn_with(small_spec(dir.path(), 640, 640), shell("exit 0"))
            .await
            .unwrap();

        let err = encoder.write(&Frame::new(640, 640)).await.unwrap_err();
        assert!(matches!(err, MediaError::EncodeFailure { .. }), "{:?}", err);
        assert_eq!(err.frames_written(), Some(0));
        assert!(err.to_string().contains("pipe broken"), "{}", err);

        let err = encoder.write(&Frame::new(640, 640)).await.unwrap_err();
        assert!(err.to_string().contains("write after encoder was closed"), "{}", err);
    }

    #[tokio::test]
    async fn test_encoder_failed_exit_reports_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = StreamEncoder::spawn_with(
            small_spec(dir.path(), 8, 8),
            shell("cat >/dev/null; echo 'muxer failed' >&2; exit 3"),
        )
        .await
        .unwrap();

        for _ in 0..5 {
            encoder.write(&Frame::new(8, 8)).await.unwrap();
        }
        let err = encoder.close().await.unwrap_err();
        match &err {
            MediaError::EncodeFailure {
                frames_written,
                exit_code,
                ..
            } => {
                assert_eq!(*frames_written, 5);
                assert_eq!(*exit_code, Some(3));
            }
            other => panic!("expected encode failure, got {:?}", other),
        }

        let err = encoder.write(&Frame::new(8, 8)).await.unwrap_err();
        assert!(err.to_string().contains("write after encoder was closed"), "{}", err);
        assert_eq!(err.frames_written(), Some(5));
    }

    #[tokio::test]
    async fn test_encoder_rejects_wrong_frame_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut encoder = StreamEncoder::spawn_with(small_spec(dir.path(), 8, 8), shell("cat >/dev/null"))
            .await
            .unwrap();

        let err = encoder.write(&Frame::new(4, 8)).await.unwrap_err();
        assert!(matches!(err, MediaError::Validation(_)));
        assert_eq!(encoder.frames_written(), 0);
        encoder.abort().await;
    }

    #[test]
    fn test_args_with_audio() {
        let args = spec(Some("/tmp/a.aac")).build_args().join(" ");
        assert!(args.contains("-i pipe:0 -i /tmp/a.aac -map 0:v:0 -map 1:a:0"));
        assert!(args.contains("-c:a aac -b:a 192k -shortest"));
    }
}
