//! Pipeline metrics, recorded through the `metrics` facade.
//!
//! Nothing is exported unless the host installs a recorder.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_ENCODED_TOTAL: &str = "reframe_frames_encoded_total";
    pub const DETECTION_PASSES_TOTAL: &str = "reframe_detection_passes_total";
    pub const FACES_FOUND_TOTAL: &str = "reframe_faces_found_total";
    pub const DETECTION_ERRORS_TOTAL: &str = "reframe_detection_errors_total";
    pub const MISSING_AUDIO_TOTAL: &str = "reframe_missing_audio_total";
    pub const RUNS_TOTAL: &str = "reframe_runs_total";
    pub const RUN_DURATION_SECONDS: &str = "reframe_run_duration_seconds";
}

/// Record one detection pass and whether it found a subject.
pub fn record_detection(found: bool) {
    counter!(names::DETECTION_PASSES_TOTAL).increment(1);
    if found {
        counter!(names::FACES_FOUND_TOTAL).increment(1);
    }
}

/// Record a detector error that was absorbed as "no face".
pub fn record_detection_error(backend: &'static str) {
    counter!(names::DETECTION_ERRORS_TOTAL, "backend" => backend).increment(1);
}

pub fn record_missing_audio() {
    counter!(names::MISSING_AUDIO_TOTAL).increment(1);
}

/// Record the end of a run.
pub fn record_run(outcome: &'static str, frames_encoded: u64, duration_secs: f64) {
    counter!(names::RUNS_TOTAL, "outcome" => outcome).increment(1);
    counter!(names::FRAMES_ENCODED_TOTAL).increment(frames_encoded);
    histogram!(names::RUN_DURATION_SECONDS, "outcome" => outcome).record(duration_secs);
}
