//! Crop window geometry.
//!
//! The window size is computed once per run from the source resolution and
//! the target aspect ratio; only its position changes afterwards. Every
//! window returned by [`CropGeometry::compute`] lies fully inside the frame.

use reframe_models::AspectRatio;

use super::models::CropWindow;
use crate::error::{MediaError, MediaResult};

/// Fixed-size crop rectangle for one source resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropGeometry {
    frame_width: u32,
    frame_height: u32,
    crop_width: u32,
    crop_height: u32,
}

impl CropGeometry {
    /// Compute the crop size for a `frame_width x frame_height` source.
    ///
    /// The crop spans the full frame height when the frame is wide enough,
    /// otherwise the full width. Both sides are rounded down to even values.
    pub fn new(frame_width: u32, frame_height: u32, aspect: AspectRatio) -> MediaResult<Self> {
        if frame_width < 2 || frame_height < 2 {
            return Err(MediaError::validation(format!(
                "frame size {}x{} is too small to crop",
                frame_width, frame_height
            )));
        }
        if aspect.width == 0 || aspect.height == 0 {
            return Err(MediaError::validation(format!("invalid aspect ratio {}", aspect)));
        }

        let ratio = aspect.ratio();
        let mut crop_height = frame_height;
        let mut crop_width = (frame_height as f64 * ratio).round() as u32;

        if crop_width > frame_width {
            crop_width = frame_width;
            crop_height = ((frame_width as f64 / ratio).round() as u32).min(frame_height);
        }

        Ok(Self {
            frame_width,
            frame_height,
            crop_width: round_down_even(crop_width),
            crop_height: round_down_even(crop_height),
        })
    }

    pub fn frame_size(&self) -> (u32, u32) {
        (self.frame_width, self.frame_height)
    }

    pub fn crop_size(&self) -> (u32, u32) {
        (self.crop_width, self.crop_height)
    }

    /// Frame center, the fallback target when no subject is known.
    pub fn frame_center(&self) -> (f64, f64) {
        (self.frame_width as f64 / 2.0, self.frame_height as f64 / 2.0)
    }

    /// Window of the fixed size centered on `(cx, cy)`, clamped into the frame.
    ///
    /// Accepts any input, including negative, out-of-frame and non-finite
    /// coordinates.
    pub fn compute(&self, cx: f64, cy: f64) -> CropWindow {
        let x = clamp_origin(cx, self.crop_width, self.frame_width);
        let y = clamp_origin(cy, self.crop_height, self.frame_height);
        CropWindow::new(x, y, self.crop_width, self.crop_height)
    }

    /// Window centered on the frame.
    pub fn centered(&self) -> CropWindow {
        let (cx, cy) = self.frame_center();
        self.compute(cx, cy)
    }
}

fn round_down_even(value: u32) -> u32 {
    (value - value % 2).max(2)
}

/// Left/top edge of a `size` span centered on `center`, clamped to `[0, limit - size]`.
fn clamp_origin(center: f64, size: u32, limit: u32) -> u32 {
    let max_origin = limit.saturating_sub(size) as f64;
    let origin = center - size as f64 / 2.0;
    if origin.is_nan() {
        return (max_origin / 2.0).floor() as u32;
    }
    origin.floor().clamp(0.0, max_origin) as u32
}
