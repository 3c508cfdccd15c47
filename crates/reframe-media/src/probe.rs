//! FFprobe video metadata.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Frame rate assumed when the container reports none.
pub const DEFAULT_FPS: f64 = 30.0;

/// Metadata of the first video stream of a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    /// Displayed width in pixels, after applying `rotation`
    pub width: u32,
    /// Displayed height in pixels, after applying `rotation`
    pub height: u32,
    /// Display rotation in degrees (0, 90, 180 or 270)
    pub rotation: u32,
    /// Frame rate reduced to a float
    pub fps: f64,
    /// Frame rate as reported, `(numerator, denominator)`
    pub frame_rate: (u32, u32),
    /// Duration in seconds
    pub duration: f64,
    /// Video codec
    pub codec: String,
    /// Frame count, estimated from fps and duration when not reported
    pub frame_count: u64,
    /// Whether the file carries at least one audio stream
    pub has_audio: bool,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    duration: Option<String>,
    nb_frames: Option<String>,
    #[serde(default)]
    tags: Option<FfprobeTags>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

impl FfprobeStream {
    /// Rotation from the display matrix, or the legacy `rotate` tag.
    fn rotation(&self) -> u32 {
        self.side_data_list
            .iter()
            .find_map(|d| d.rotation)
            .or_else(|| {
                self.tags
                    .as_ref()
                    .and_then(|t| t.rotate.as_deref())
                    .and_then(|r| r.trim().parse::<f64>().ok())
            })
            .map(normalize_rotation)
            .unwrap_or(0)
    }
}

/// Probe a video file for metadata.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoMetadata> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed for {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    let metadata = parse_probe_output(&output.stdout)?;
    debug!(
        width = metadata.width,
        height = metadata.height,
        fps = metadata.fps,
        frames = metadata.frame_count,
        "Probed {}",
        path.display()
    );
    Ok(metadata)
}

/// Interpret ffprobe's JSON document.
pub fn parse_probe_output(json: &[u8]) -> MediaResult<VideoMetadata> {
    let probe: FfprobeOutput = serde_json::from_slice(json)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let coded_width = video.width.unwrap_or(0);
    let coded_height = video.height.unwrap_or(0);
    if coded_width == 0 || coded_height == 0 {
        return Err(MediaError::InvalidVideo(format!(
            "Video stream has no dimensions ({}x{})",
            coded_width, coded_height
        )));
    }

    // FFmpeg auto-rotates on decode, so decoded frames have the displayed size.
    let rotation = video.rotation();
    let (width, height) = if rotation % 180 == 90 {
        (coded_height, coded_width)
    } else {
        (coded_width, coded_height)
    };

    let (fps, frame_rate) = video
        .r_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .unwrap_or((DEFAULT_FPS, (DEFAULT_FPS as u32, 1)));

    // Stream duration is more precise; the container duration covers the rest.
    let duration = video
        .duration
        .as_deref()
        .and_then(parse_positive)
        .or_else(|| {
            probe
                .format
                .as_ref()
                .and_then(|f| f.duration.as_deref())
                .and_then(parse_positive)
        })
        .unwrap_or(0.0);

    let frame_count = video
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|&n| n > 0)
        .unwrap_or_else(|| estimate_frame_count(fps, duration));

    Ok(VideoMetadata {
        width,
        height,
        rotation,
        fps,
        frame_rate,
        duration,
        codec: video.codec_name.clone().unwrap_or_default(),
        frame_count,
        has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
    })
}

/// `round(fps * duration)`.
pub fn estimate_frame_count(fps: f64, duration: f64) -> u64 {
    let frames = (fps * duration).round();
    if frames.is_finite() && frames > 0.0 {
        frames as u64
    } else {
        0
    }
}

/// Snap a signed angle to a quarter turn in `[0, 360)`.
fn normalize_rotation(degrees: f64) -> u32 {
    if !degrees.is_finite() {
        return 0;
    }
    let quarter_turns = (degrees / 90.0).round() as i64;
    (quarter_turns.rem_euclid(4) * 90) as u32
}

fn parse_positive(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite() && *v > 0.0)
}

/// Parse frame rate string (e.g., "30000/1001" or "25"), returning the
/// float value and the rational it came from.
pub fn parse_frame_rate(s: &str) -> Option<(f64, (u32, u32))> {
    let s = s.trim();
    if let Some((num, den)) = s.split_once('/') {
        let num: u32 = num.trim().parse().ok()?;
        let den: u32 = den.trim().parse().ok()?;
        if den == 0 || num == 0 {
            return None;
        }
        return Some((num as f64 / den as f64, (num, den)));
    }
    let fps: f64 = s.parse().ok()?;
    if fps.is_finite() && fps > 0.0 {
        // Decimal rates are kept to millihertz precision.
        Some((fps, ((fps * 1000.0).round() as u32, 1000)))
    } else {
        None
    }
}
