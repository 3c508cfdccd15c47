//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;

use reframe_media::reframe::{LocatorSettings, ModelVariant, SmootherSettings};
use reframe_media::ReframeConfig;
use reframe_models::{AspectRatio, PipelineConfig, SmoothingMethod};

use crate::cli::Args;
use crate::error::{WorkerError, WorkerResult};

/// Longest segment a single job may reframe, in seconds.
pub const DEFAULT_MAX_CLIP_SECONDS: f64 = 120.0;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory for generated output files
    pub output_dir: PathBuf,
    /// Parent directory of per-job temporary work directories (system temp when unset)
    pub work_dir: Option<PathBuf>,
    /// Maximum segment duration accepted
    pub max_clip_seconds: f64,
    /// Everything handed to the pipeline
    pub reframe: ReframeConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            work_dir: None,
            max_clip_seconds: DEFAULT_MAX_CLIP_SECONDS,
            reframe: ReframeConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// Unset values take their defaults. An unknown smoothing method, aspect
    /// ratio or model variant is an error; unparsable numbers fall back to
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let parsed = |key: &str| get(key).and_then(|v| v.parse::<f64>().ok());

        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            smoothing: parse_required(get("REFRAME_SMOOTHING"), "REFRAME_SMOOTHING")?
                .unwrap_or(SmoothingMethod::default()),
            detection_interval: parse_or(get("REFRAME_DETECTION_INTERVAL"), defaults.detection_interval),
            output_width: parse_or(get("REFRAME_OUTPUT_WIDTH"), defaults.output_width),
            output_height: parse_or(get("REFRAME_OUTPUT_HEIGHT"), defaults.output_height),
            aspect_ratio: parse_required(get("REFRAME_ASPECT"), "REFRAME_ASPECT")?
                .unwrap_or(AspectRatio::default()),
            encoding: defaults.encoding,
        };

        let smoother_defaults = SmootherSettings::default();
        let smoother = SmootherSettings {
            process_noise: parsed("REFRAME_PROCESS_NOISE").unwrap_or(smoother_defaults.process_noise),
            measurement_noise: parsed("REFRAME_MEASUREMENT_NOISE")
                .unwrap_or(smoother_defaults.measurement_noise),
            ema_alpha: parsed("REFRAME_EMA_ALPHA").unwrap_or(smoother_defaults.ema_alpha),
            freeze_threshold: parse_or(get("REFRAME_FREEZE_FRAMES"), smoother_defaults.freeze_threshold),
        };

        let locator_defaults = LocatorSettings::default();
        let locator = LocatorSettings {
            min_confidence: parsed("REFRAME_MIN_CONFIDENCE").unwrap_or(locator_defaults.min_confidence),
            model_variant: parse_required(get("REFRAME_MODEL_VARIANT"), "REFRAME_MODEL_VARIANT")?
                .unwrap_or(ModelVariant::default()),
            model_path: get("REFRAME_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(locator_defaults.model_path),
            center_bias: locator_defaults.center_bias,
        };

        Ok(Self {
            output_dir: get("REFRAME_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("output")),
            work_dir: get("REFRAME_WORK_DIR").map(PathBuf::from),
            max_clip_seconds: parsed("REFRAME_MAX_CLIP_SECONDS").unwrap_or(DEFAULT_MAX_CLIP_SECONDS),
            reframe: ReframeConfig {
                pipeline,
                smoother,
                locator,
                ffmpeg_timeout_secs: get("REFRAME_FFMPEG_TIMEOUT_SECS").and_then(|v| v.parse().ok()),
            },
        })
    }

    /// Command-line values take precedence over the environment.
    pub fn apply_args(&mut self, args: &Args) {
        let pipeline = &mut self.reframe.pipeline;
        if let Some(smoothing) = args.smoothing {
            pipeline.smoothing = smoothing;
        }
        if let Some(interval) = args.interval {
            pipeline.detection_interval = interval;
        }
        if let Some(width) = args.width {
            pipeline.output_width = width;
        }
        if let Some(height) = args.height {
            pipeline.output_height = height;
        }
        if let Some(aspect) = args.aspect {
            pipeline.aspect_ratio = aspect;
        }
        if let Some(dir) = &args.output_dir {
            self.output_dir = dir.clone();
        }
        if let Some(path) = &args.model {
            self.reframe.locator.model_path = path.clone();
        }
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Parse a set value, rejecting anything unrecognized.
fn parse_required<T>(value: Option<String>, key: &str) -> WorkerResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| WorkerError::config_error(format!("{}={}: {}", key, v, e)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = WorkerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("output"));
        assert!(config.work_dir.is_none());
        assert_eq!(config.max_clip_seconds, 120.0);
        assert_eq!(config.reframe.pipeline.smoothing, SmoothingMethod::Kalman);
        assert_eq!(config.reframe.pipeline.detection_interval, 3);
        assert_eq!(config.reframe.smoother.freeze_threshold, 10);
        assert!(config.reframe.ffmpeg_timeout_secs.is_none());
        assert!(config.reframe.validate().is_ok());
    }

    #[test]
    fn test_env_values_parsed() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("REFRAME_OUTPUT_DIR", "/srv/shorts"),
            ("REFRAME_SMOOTHING", "ema"),
            ("REFRAME_DETECTION_INTERVAL", "5"),
            ("REFRAME_ASPECT", "4:5"),
            ("REFRAME_EMA_ALPHA", "0.3"),
            ("REFRAME_FREEZE_FRAMES", "4"),
            ("REFRAME_MODEL_VARIANT", "short"),
            ("REFRAME_MAX_CLIP_SECONDS", "60"),
            ("REFRAME_FFMPEG_TIMEOUT_SECS", "300"),
        ]))
        .unwrap();

        assert_eq!(config.output_dir, PathBuf::from("/srv/shorts"));
        assert_eq!(config.reframe.pipeline.smoothing, SmoothingMethod::Ema);
        assert_eq!(config.reframe.pipeline.detection_interval, 5);
        assert_eq!(config.reframe.pipeline.aspect_ratio, AspectRatio::FEED_PORTRAIT);
        assert_eq!(config.reframe.smoother.ema_alpha, 0.3);
        assert_eq!(config.reframe.smoother.freeze_threshold, 4);
        assert_eq!(config.reframe.locator.model_variant, ModelVariant::ShortRange);
        assert_eq!(config.max_clip_seconds, 60.0);
        assert_eq!(config.reframe.ffmpeg_timeout_secs, Some(300));
    }

    #[test]
    fn test_unparsable_numbers_fall_back() {
        let config = WorkerConfig::from_lookup(lookup(&[
            ("REFRAME_DETECTION_INTERVAL", "often"),
            ("REFRAME_OUTPUT_DIR", "   "),
            ("REFRAME_SMOOTHING", "  "),
        ]))
        .unwrap();
        assert_eq!(config.reframe.pipeline.smoothing, SmoothingMethod::Kalman);
        assert_eq!(config.reframe.pipeline.detection_interval, 3);
        assert_eq!(config.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn test_unknown_smoothing_method_rejected() {
        let err = WorkerConfig::from_lookup(lookup(&[("REFRAME_SMOOTHING", "median")])).unwrap_err();
        assert!(matches!(err, WorkerError::ConfigError(_)));
        assert!(err.is_rejection());
        assert!(err.to_string().contains("REFRAME_SMOOTHING=median"), "{}", err);
    }

    #[test]
    fn test_unknown_aspect_and_variant_rejected() {
        let err = WorkerConfig::from_lookup(lookup(&[("REFRAME_ASPECT", "tall")])).unwrap_err();
        assert!(matches!(err, WorkerError::ConfigError(_)));

        let err = WorkerConfig::from_lookup(lookup(&[("REFRAME_MODEL_VARIANT", "huge")])).unwrap_err();
        assert!(matches!(err, WorkerError::ConfigError(_)));
    }

    #[test]
    fn test_args_override_env() {
        let mut config = WorkerConfig::from_lookup(lookup(&[
            ("REFRAME_SMOOTHING", "ema"),
            ("REFRAME_DETECTION_INTERVAL", "5"),
        ]))
        .unwrap();
        let args = Args::try_parse_from([
            "reframe-worker",
            "--input",
            "talk.mp4",
            "--start",
            "1:00",
            "--end",
            "1:30",
            "--smoothing",
            "kalman",
            "--width",
            "720",
            "--height",
            "1280",
        ])
        .unwrap();

        config.apply_args(&args);

        assert_eq!(config.reframe.pipeline.smoothing, SmoothingMethod::Kalman);
        assert_eq!(config.reframe.pipeline.detection_interval, 5);
        assert_eq!(config.reframe.pipeline.output_width, 720);
        assert_eq!(config.reframe.pipeline.output_height, 1280);
    }
}
