//! Time range parsing and validation.
//!
//! Segment boundaries arrive either as plain seconds (`"12.5"`) or as
//! clock timestamps (`HH:MM:SS`, `MM:SS`, optionally with milliseconds).

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Parse a timestamp string to total seconds.
///
/// # Examples
/// ```
/// use reframe_models::timestamp::parse_timestamp;
/// assert_eq!(parse_timestamp("01:30:00").unwrap(), 5400.0);
/// assert_eq!(parse_timestamp("05:30").unwrap(), 330.0);
/// assert_eq!(parse_timestamp("12.5").unwrap(), 12.5);
/// ```
pub fn parse_timestamp(ts: &str) -> Result<f64, TimestampError> {
    let ts = ts.trim();
    if ts.is_empty() {
        return Err(TimestampError::Empty);
    }

    let parts: Vec<&str> = ts.split(':').collect();
    if parts.len() > 3 {
        return Err(TimestampError::InvalidFormat(ts.to_string()));
    }

    // Components are read right to left: seconds, minutes, hours.
    const NAMES: [&str; 3] = ["seconds", "minutes", "hours"];
    const SCALES: [f64; 3] = [1.0, 60.0, 3600.0];

    let mut total = 0.0;
    for (i, part) in parts.iter().rev().enumerate() {
        let value: f64 = part
            .trim()
            .parse()
            .map_err(|_| TimestampError::InvalidValue(NAMES[i], part.to_string()))?;
        if !value.is_finite() {
            return Err(TimestampError::InvalidValue(NAMES[i], part.to_string()));
        }
        if value < 0.0 {
            return Err(TimestampError::Negative);
        }
        total += value * SCALES[i];
    }
    Ok(total)
}

/// Format seconds into HH:MM:SS or HH:MM:SS.mmm string.
pub fn format_seconds(total_secs: f64) -> String {
    let hours = (total_secs / 3600.0).floor() as u32;
    let mins = ((total_secs % 3600.0) / 60.0).floor() as u32;
    let secs = total_secs % 60.0;

    if (secs - secs.floor()).abs() > 0.0001 {
        format!("{:02}:{:02}:{:06.3}", hours, mins, secs)
    } else {
        format!("{:02}:{:02}:{:02}", hours, mins, secs.floor() as u32)
    }
}

/// A validated `[start, end)` segment of the source, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    /// Build a range, checking `0 <= start < end` and finiteness.
    pub fn new(start: f64, end: f64) -> Result<Self, TimestampError> {
        if !start.is_finite() || !end.is_finite() {
            return Err(TimestampError::NotFinite);
        }
        if start < 0.0 || end < 0.0 {
            return Err(TimestampError::Negative);
        }
        if start >= end {
            return Err(TimestampError::StartNotBeforeEnd { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse both ends from timestamp strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimestampError> {
        Self::new(parse_timestamp(start)?, parse_timestamp(end)?)
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Reject ranges longer than `max_secs`.
    pub fn ensure_max_duration(&self, max_secs: f64) -> Result<(), TimestampError> {
        if self.duration() > max_secs {
            return Err(TimestampError::ExceedsMaxDuration {
                duration: self.duration(),
                max: max_secs,
            });
        }
        Ok(())
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", format_seconds(self.start), format_seconds(self.end))
    }
}

/// Timestamp parsing/validation error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimestampError {
    #[error("Timestamp cannot be empty")]
    Empty,

    #[error("Timestamp cannot be negative")]
    Negative,

    #[error("Timestamp must be a finite number")]
    NotFinite,

    #[error("Invalid {0} value: {1}")]
    InvalidValue(&'static str, String),

    #[error("Invalid timestamp format '{0}'. Use seconds, HH:MM:SS, or MM:SS")]
    InvalidFormat(String),

    #[error("Start time ({start}s) must be before end time ({end}s)")]
    StartNotBeforeEnd { start: f64, end: f64 },

    #[error("Segment of {duration:.1}s exceeds the maximum of {max:.1}s")]
    ExceedsMaxDuration { duration: f64, max: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("00:00:00").unwrap(), 0.0);
        assert_eq!(parse_timestamp("01:30:45").unwrap(), 5445.0);
        assert_eq!(parse_timestamp("53:53").unwrap(), 3233.0);
        assert_eq!(parse_timestamp("90").unwrap(), 90.0);
        assert!((parse_timestamp("00:00:30.500").unwrap() - 30.5).abs() < 0.001);
    }

    #[test]
    fn test_parse_timestamp_errors() {
        assert!(matches!(parse_timestamp(""), Err(TimestampError::Empty)));
        assert!(matches!(parse_timestamp("  "), Err(TimestampError::Empty)));
        assert!(matches!(parse_timestamp("abc"), Err(TimestampError::InvalidValue(_, _))));
        assert!(matches!(parse_timestamp("-5"), Err(TimestampError::Negative)));
        assert!(matches!(parse_timestamp("inf"), Err(TimestampError::InvalidValue(_, _))));
        assert!(matches!(parse_timestamp("1:2:3:4"), Err(TimestampError::InvalidFormat(_))));
    }

    #[test]
    fn test_time_range_validation() {
        let range = TimeRange::new(10.0, 25.5).unwrap();
        assert!((range.duration() - 15.5).abs() < 1e-9);

        assert!(matches!(
            TimeRange::new(20.0, 10.0),
            Err(TimestampError::StartNotBeforeEnd { .. })
        ));
        assert!(matches!(
            TimeRange::new(5.0, 5.0),
            Err(TimestampError::StartNotBeforeEnd { .. })
        ));
        assert!(matches!(TimeRange::new(-1.0, 5.0), Err(TimestampError::Negative)));
        assert!(matches!(TimeRange::new(0.0, f64::NAN), Err(TimestampError::NotFinite)));
    }

    #[test]
    fn test_time_range_parse_and_max_duration() {
        let range = TimeRange::parse("00:01:00", "00:03:30").unwrap();
        assert_eq!(range.start, 60.0);
        assert_eq!(range.end, 210.0);
        assert!(range.ensure_max_duration(120.0).is_err());
        assert!(range.ensure_max_duration(150.0).is_ok());
    }

    #[test]
    fn test_range_display() {
        let range = TimeRange::new(65.0, 95.5).unwrap();
        assert_eq!(range.to_string(), "00:01:05-00:01:35.500");
    }

    #[test]
    fn test_format_seconds() {
        assert_eq!(format_seconds(0.0), "00:00:00");
        assert_eq!(format_seconds(90.0), "00:01:30");
        assert_eq!(format_seconds(3661.0), "01:01:01");
        assert_eq!(format_seconds(30.25), "00:00:30.250");
    }
}
