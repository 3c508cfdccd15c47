//! Sequential frame decoding.
//!
//! [`FrameSource`] decodes a file through an FFmpeg child process writing
//! packed RGB24 to stdout and yields `(index, frame)` pairs in presentation
//! order. Only one frame is held at a time; the stream is single-pass.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::frame::{frame_from_bytes, frame_len, Frame};
use crate::command::{check_ffmpeg, read_tail};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_video, VideoMetadata};

/// A finite, ordered, non-restartable stream of decoded frames.
#[async_trait]
pub trait FrameStream: Send {
    /// Frame size `(width, height)`.
    fn dimensions(&self) -> (u32, u32);

    /// Frame rate as `(numerator, denominator)`.
    fn frame_rate(&self) -> (u32, u32);

    /// Expected number of frames, queried once up front.
    fn frame_count(&self) -> u64;

    /// Next frame, or `None` once the stream is exhausted.
    async fn next_frame(&mut self) -> MediaResult<Option<(u64, Frame)>>;

    /// Release the underlying decoder. Safe to call more than once.
    async fn close(&mut self) -> MediaResult<()>;
}

/// Splits a byte stream into fixed-size RGB frames.
pub struct RawFrameReader<R> {
    reader: R,
    width: u32,
    height: u32,
    next_index: u64,
    exhausted: bool,
}

impl<R: AsyncRead + Unpin + Send> RawFrameReader<R> {
    pub fn new(reader: R, width: u32, height: u32) -> Self {
        Self {
            reader,
            width,
            height,
            next_index: 0,
            exhausted: false,
        }
    }

    /// Read the next frame. A clean EOF ends the stream; a partial trailing
    /// frame is a decode failure.
    pub async fn read_frame(&mut self) -> MediaResult<Option<(u64, Frame)>> {
        if self.exhausted {
            return Ok(None);
        }

        let len = frame_len(self.width, self.height);
        let mut buf = vec![0u8; len];
        let mut filled = 0;
        while filled < len {
            let n = self
                .reader
                .read(&mut buf[filled..])
                .await
                .map_err(|e| MediaError::decode_failure(format!("read failed: {}", e)))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            self.exhausted = true;
            return Ok(None);
        }
        if filled < len {
            self.exhausted = true;
            return Err(MediaError::decode_failure(format!(
                "truncated frame {}: got {} of {} bytes",
                self.next_index, filled, len
            )));
        }

        let index = self.next_index;
        self.next_index += 1;
        Ok(Some((index, frame_from_bytes(self.width, self.height, buf)?)))
    }

    pub fn frames_read(&self) -> u64 {
        self.next_index
    }
}

/// FFmpeg-backed decoder over a video file.
pub struct FrameSource {
    path: PathBuf,
    metadata: VideoMetadata,
    child: Option<Child>,
    reader: Option<RawFrameReader<BufReader<ChildStdout>>>,
    stderr_task: Option<JoinHandle<String>>,
}

impl FrameSource {
    /// Probe `path` and start decoding it.
    pub async fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        let metadata = probe_video(path).await.map_err(|e| match e {
            MediaError::FileNotFound(_) | MediaError::FfprobeNotFound => e,
            other => MediaError::decode_failure(format!("cannot probe {}: {}", path.display(), other)),
        })?;
        Self::open_with_metadata(path, metadata).await
    }

    /// Start decoding with already-known metadata.
    pub async fn open_with_metadata(path: &Path, metadata: VideoMetadata) -> MediaResult<Self> {
        let ffmpeg = check_ffmpeg()?;
        Self::open_with(path, metadata, Command::new(ffmpeg)).await
    }

    /// Start decoding through `command`, which receives the decode arguments.
    pub async fn open_with(path: &Path, metadata: VideoMetadata, mut command: Command) -> MediaResult<Self> {
        let args = decode_args(path);
        debug!("Starting decoder: {:?} {}", command.as_std().get_program(), args.join(" "));

        let mut child = command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| MediaError::decode_failure(format!("failed to spawn FFmpeg: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::decode_failure("failed to capture FFmpeg stdout"))?;
        let stderr_task = child.stderr.take().map(|s| tokio::spawn(read_tail(s)));

        Ok(Self {
            path: path.to_path_buf(),
            reader: Some(RawFrameReader::new(
                BufReader::with_capacity(frame_len(metadata.width, metadata.height).min(1 << 22), stdout),
                metadata.width,
                metadata.height,
            )),
            metadata,
            child: Some(child),
            stderr_task,
        })
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    pub fn fps(&self) -> f64 {
        self.metadata.fps
    }

    /// Wait for the decoder after EOF and surface a failed exit.
    async fn finish(&mut self) -> MediaResult<()> {
        self.reader = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().await?;
        let stderr = self.take_stderr().await;
        if status.success() {
            Ok(())
        } else {
            Err(MediaError::decode_failure(format!(
                "decoder for {} exited with {:?}: {}",
                self.path.display(),
                status.code(),
                stderr.unwrap_or_default()
            )))
        }
    }

    async fn take_stderr(&mut self) -> Option<String> {
        match self.stderr_task.take() {
            Some(handle) => handle.await.ok().filter(|s| !s.is_empty()),
            None => None,
        }
    }
}

#[async_trait]
impl FrameStream for FrameSource {
    fn dimensions(&self) -> (u32, u32) {
        (self.metadata.width, self.metadata.height)
    }

    fn frame_rate(&self) -> (u32, u32) {
        self.metadata.frame_rate
    }

    fn frame_count(&self) -> u64 {
        self.metadata.frame_count
    }

    async fn next_frame(&mut self) -> MediaResult<Option<(u64, Frame)>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        match reader.read_frame().await {
            Ok(Some(item)) => Ok(Some(item)),
            Ok(None) => {
                self.finish().await?;
                Ok(None)
            }
            Err(e) => {
                let _ = self.close().await;
                Err(e)
            }
        }
    }

    async fn close(&mut self) -> MediaResult<()> {
        self.reader = None;
        if let Some(mut child) = self.child.take() {
            if child.try_wait()?.is_none() {
                debug!("Stopping decoder for {}", self.path.display());
                if let Err(e) = child.kill().await {
                    warn!("Failed to stop decoder: {}", e);
                }
            }
            let _ = child.wait().await;
        }
        self.take_stderr().await;
        Ok(())
    }
}

/// Arguments for decoding `path` to RGB24 on stdout, one output frame per input frame.
///
/// Auto-rotation stays on: frames come out at the display size that
/// [`probe_video`] reports for rotated streams.
pub fn decode_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-i".to_string(),
        path.to_string_lossy().to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-vsync".to_string(),
        "passthrough".to_string(),
        "-f".to_string(),
        "rawvideo".to_string(),
        "-pix_fmt".to_string(),
        "rgb24".to_string(),
        "-".to_string(),
    ]
}
