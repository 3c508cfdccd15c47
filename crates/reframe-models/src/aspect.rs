//! Target aspect ratio for the crop window.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Width:height ratio of the output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Vertical short-form video (9:16).
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };

    /// Square (1:1)
    pub const SQUARE: AspectRatio = AspectRatio {
        width: 1,
        height: 1,
    };

    /// Feed portrait (4:5)
    pub const FEED_PORTRAIT: AspectRatio = AspectRatio {
        width: 4,
        height: 5,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height.
    pub fn ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }

    /// Derive the ratio of an output resolution, reduced by the GCD.
    pub fn from_resolution(width: u32, height: u32) -> Result<Self, AspectRatioParseError> {
        if width == 0 || height == 0 {
            return Err(AspectRatioParseError::ZeroValue);
        }
        let g = gcd(width, height);
        Ok(Self::new(width / g, height / g))
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| AspectRatioParseError::InvalidFormat(s.to_string()))?;

        let width = w
            .trim()
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(w.to_string()))?;
        let height = h
            .trim()
            .parse()
            .map_err(|_| AspectRatioParseError::InvalidNumber(h.to_string()))?;

        if width == 0 || height == 0 {
            return Err(AspectRatioParseError::ZeroValue);
        }

        Ok(AspectRatio { width, height })
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::PORTRAIT
    }
}

#[derive(Debug, Error)]
pub enum AspectRatioParseError {
    #[error("Invalid aspect ratio format: {0}, expected 'W:H'")]
    InvalidFormat(String),
    #[error("Invalid number in aspect ratio: {0}")]
    InvalidNumber(String),
    #[error("Aspect ratio cannot have zero values")]
    ZeroValue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aspect_ratio() {
        assert_eq!("9:16".parse::<AspectRatio>().unwrap(), AspectRatio::PORTRAIT);
        assert_eq!(" 4 : 5 ".parse::<AspectRatio>().unwrap(), AspectRatio::FEED_PORTRAIT);
        assert!(matches!(
            "916".parse::<AspectRatio>(),
            Err(AspectRatioParseError::InvalidFormat(_))
        ));
        assert!(matches!(
            "a:16".parse::<AspectRatio>(),
            Err(AspectRatioParseError::InvalidNumber(_))
        ));
        assert!(matches!(
            "0:16".parse::<AspectRatio>(),
            Err(AspectRatioParseError::ZeroValue)
        ));
    }

    #[test]
    fn test_ratio_and_display() {
        assert!((AspectRatio::PORTRAIT.ratio() - 0.5625).abs() < 1e-9);
        assert_eq!(AspectRatio::PORTRAIT.to_string(), "9:16");
    }

    #[test]
    fn test_from_resolution() {
        assert_eq!(
            AspectRatio::from_resolution(1080, 1920).unwrap(),
            AspectRatio::PORTRAIT
        );
        assert_eq!(AspectRatio::from_resolution(720, 720).unwrap(), AspectRatio::SQUARE);
        assert!(AspectRatio::from_resolution(0, 1920).is_err());
    }
}
