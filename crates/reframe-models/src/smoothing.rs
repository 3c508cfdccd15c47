//! Smoothing strategy selection.
//!
//! - `Kalman`: constant-velocity predictive filter, can extrapolate through
//!   missed detections (default)
//! - `Ema`: exponential moving average, holds the last value on a miss

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Per-axis smoothing strategy applied to the subject position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMethod {
    /// Predictive [position, velocity] filter.
    #[default]
    Kalman,

    /// Exponential moving average.
    Ema,
}

impl SmoothingMethod {
    pub const ALL: &'static [SmoothingMethod] = &[SmoothingMethod::Kalman, SmoothingMethod::Ema];

    pub fn as_str(&self) -> &'static str {
        match self {
            SmoothingMethod::Kalman => "kalman",
            SmoothingMethod::Ema => "ema",
        }
    }

    /// Returns true if the strategy can extrapolate without a measurement.
    pub fn can_predict(&self) -> bool {
        matches!(self, SmoothingMethod::Kalman)
    }
}

impl fmt::Display for SmoothingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SmoothingMethod {
    type Err = SmoothingMethodParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kalman" => Ok(SmoothingMethod::Kalman),
            "ema" | "exponential" => Ok(SmoothingMethod::Ema),
            _ => Err(SmoothingMethodParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown smoothing method: {0} (expected 'kalman' or 'ema')")]
pub struct SmoothingMethodParseError(pub String);
