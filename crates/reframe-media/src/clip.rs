//! Segment extraction: the time-range subclip and its audio track.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Build the stream-copy command for `[start, end)` of `input`.
pub fn subclip_command(input: &Path, output: &Path, start: f64, end: f64) -> FfmpegCommand {
    FfmpegCommand::new(input, output)
        .seek(start)
        .duration(end - start)
        .stream_copy()
        .output_args(["-avoid_negative_ts", "make_zero"])
}

/// Build the audio-only command for `video`.
pub fn audio_command(video: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(video, output).no_video().audio_codec("copy")
}

/// Extract `[start, end)` of `input` into `output` without re-encoding.
///
/// The cut snaps to the preceding keyframe, so the subclip may start
/// slightly earlier than `start`.
pub async fn extract_subclip(
    runner: &FfmpegRunner,
    input: impl AsRef<Path>,
    start: f64,
    end: f64,
    output: impl AsRef<Path>,
) -> MediaResult<PathBuf> {
    let input = input.as_ref();
    let output = output.as_ref();

    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    if !(start.is_finite() && end.is_finite()) || start < 0.0 || end <= start {
        return Err(MediaError::validation(format!(
            "invalid time range {:.3}s..{:.3}s",
            start, end
        )));
    }

    info!(
        "Extracting subclip: {} -> {} ({:.2}s..{:.2}s)",
        input.display(),
        output.display(),
        start,
        end
    );

    runner
        .run(&subclip_command(input, output, start, end))
        .await
        .map_err(|e| match e {
            MediaError::FfmpegFailed { stderr, .. } => MediaError::decode_failure(format!(
                "subclip extraction failed for {}: {}",
                input.display(),
                stderr.unwrap_or_default()
            )),
            other => other,
        })?;

    if !output.exists() {
        return Err(MediaError::decode_failure(format!(
            "subclip extraction produced no file at {}",
            output.display()
        )));
    }
    Ok(output.to_path_buf())
}

/// Copy the audio track of `video` into `output`.
///
/// Any failure is reported as [`MediaError::MissingAudio`], which callers
/// treat as "produce silent output".
pub async fn extract_audio(
    runner: &FfmpegRunner,
    video: impl AsRef<Path>,
    output: impl AsRef<Path>,
) -> MediaResult<PathBuf> {
    let video = video.as_ref();
    let output = output.as_ref();

    if let Err(e) = runner.run(&audio_command(video, output)).await {
        warn!("Audio extraction failed for {}: {}", video.display(), e);
        let _ = tokio::fs::remove_file(output).await;
        return Err(MediaError::missing_audio(e.to_string()));
    }

    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(output.to_path_buf()),
        _ => {
            let _ = tokio::fs::remove_file(output).await;
            Err(MediaError::missing_audio(format!(
                "{} has no audio stream",
                video.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subclip_command_args() {
        let args = subclip_command(Path::new("in.mp4"), Path::new("sub.mp4"), 12.5, 42.5)
            .build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-ss 12.500 -i in.mp4"));
        assert!(joined.contains("-t 30.000"));
        assert!(joined.contains("-c copy"));
        assert!(joined.ends_with("-avoid_negative_ts make_zero sub.mp4"));
    }

    #[test]
    fn test_audio_command_args() {
        let joined = audio_command(Path::new("sub.mp4"), Path::new("sub.aac"))
            .build_args()
            .join(" ");
        assert!(joined.ends_with("-i sub.mp4 -vn -acodec copy sub.aac"));
    }

    #[tokio::test]
    async fn test_extract_subclip_validates_before_running() {
        let runner = FfmpegRunner::new();
        let missing = extract_subclip(&runner, "/nonexistent.mp4", 0.0, 5.0, "/tmp/out.mp4").await;
        assert!(matches!(missing, Err(MediaError::FileNotFound(_))));

        let input = tempfile::NamedTempFile::new().unwrap();
        let reversed = extract_subclip(&runner, input.path(), 10.0, 5.0, "/tmp/out.mp4").await;
        assert!(matches!(reversed, Err(MediaError::Validation(_))));
    }
}
