//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

use reframe_models::{parse_timestamp, AspectRatio, SmoothingMethod};

/// Reframe one segment of a landscape video into a vertical short.
#[derive(Debug, Clone, Parser)]
#[command(name = "reframe-worker", version, about)]
pub struct Args {
    /// Source video file
    #[arg(short, long)]
    pub input: PathBuf,

    /// Segment start (seconds, MM:SS or HH:MM:SS)
    #[arg(short, long, value_parser = parse_timestamp)]
    pub start: f64,

    /// Segment end (seconds, MM:SS or HH:MM:SS)
    #[arg(short, long, value_parser = parse_timestamp)]
    pub end: f64,

    /// Output file; generated in the output directory when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Directory for generated output files [env: REFRAME_OUTPUT_DIR]
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Smoothing strategy: kalman or ema [env: REFRAME_SMOOTHING]
    #[arg(long)]
    pub smoothing: Option<SmoothingMethod>,

    /// Run face detection every N frames [env: REFRAME_DETECTION_INTERVAL]
    #[arg(long)]
    pub interval: Option<u32>,

    /// Output width in pixels [env: REFRAME_OUTPUT_WIDTH]
    #[arg(long)]
    pub width: Option<u32>,

    /// Output height in pixels [env: REFRAME_OUTPUT_HEIGHT]
    #[arg(long)]
    pub height: Option<u32>,

    /// Crop aspect ratio as W:H [env: REFRAME_ASPECT]
    #[arg(long)]
    pub aspect: Option<AspectRatio>,

    /// SeetaFace model file [env: REFRAME_MODEL_PATH]
    #[arg(long)]
    pub model: Option<PathBuf>,

    /// Write Prometheus metrics to this file when the run ends
    #[arg(long)]
    pub metrics_out: Option<PathBuf>,

    /// Print the run summary as JSON instead of the bare output path
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let args = Args::try_parse_from([
            "reframe-worker",
            "--input",
            "talk.mp4",
            "--start",
            "00:01:05",
            "--end",
            "95.5",
        ])
        .unwrap();
        assert_eq!(args.input, PathBuf::from("talk.mp4"));
        assert_eq!(args.start, 65.0);
        assert_eq!(args.end, 95.5);
        assert!(args.output.is_none());
        assert!(args.smoothing.is_none());
        assert!(args.metrics_out.is_none());
        assert!(!args.json);
    }

    #[test]
    fn test_parse_overrides() {
        let args = Args::try_parse_from([
            "reframe-worker",
            "-i",
            "talk.mp4",
            "-s",
            "10",
            "-e",
            "20",
            "-o",
            "out/short.mp4",
            "--smoothing",
            "ema",
            "--interval",
            "1",
            "--aspect",
            "1:1",
        ])
        .unwrap();
        assert_eq!(args.output, Some(PathBuf::from("out/short.mp4")));
        assert_eq!(args.smoothing, Some(SmoothingMethod::Ema));
        assert_eq!(args.interval, Some(1));
        assert_eq!(args.aspect, Some(AspectRatio::SQUARE));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Args::try_parse_from(["reframe-worker", "-i", "a.mp4", "-s", "x", "-e", "5"]).is_err());
        assert!(Args::try_parse_from([
            "reframe-worker",
            "-i",
            "a.mp4",
            "-s",
            "0",
            "-e",
            "5",
            "--smoothing",
            "median",
        ])
        .is_err());
        assert!(Args::try_parse_from(["reframe-worker", "-s", "0", "-e", "5"]).is_err());
    }
}
