//! Data models for the reframe pipeline.

use serde::{Deserialize, Serialize};

/// One face candidate in absolute pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Left edge x-coordinate
    pub x: u32,
    /// Top edge y-coordinate
    pub y: u32,
    /// Box width
    pub width: u32,
    /// Box height
    pub height: u32,
    /// Detection confidence score (0.0-1.0)
    pub confidence: f64,
}

impl Detection {
    pub fn new(x: u32, y: u32, width: u32, height: u32, confidence: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence,
        }
    }

    /// Build from a possibly out-of-frame box, clamping it to the frame.
    ///
    /// Returns `None` when nothing of the box remains inside the frame.
    pub fn clamped(
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        confidence: f64,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<Self> {
        if ![x, y, width, height].iter().all(|v| v.is_finite()) {
            return None;
        }
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        let x1 = x.max(0.0).min(fw);
        let y1 = y.max(0.0).min(fh);
        let x2 = (x + width).max(0.0).min(fw);
        let y2 = (y + height).max(0.0).min(fh);

        let w = (x2 - x1).floor();
        let h = (y2 - y1).floor();
        if w < 1.0 || h < 1.0 {
            return None;
        }
        Some(Self::new(
            x1.floor() as u32,
            y1.floor() as u32,
            w as u32,
            h as u32,
            confidence.clamp(0.0, 1.0),
        ))
    }

    /// Center point, using integer halves of the box size.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.x + self.width / 2) as f64,
            (self.y + self.height / 2) as f64,
        )
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Rectangle cut out of every frame.
///
/// `width`/`height` are fixed for a run; `x`/`y` move per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CropWindow {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropWindow {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Linear interpolation of the position between two windows of equal size.
    ///
    /// Size is taken from `a`; it never changes within a run.
    pub fn lerp(a: &CropWindow, b: &CropWindow, t: f64) -> CropWindow {
        let t = t.clamp(0.0, 1.0);
        CropWindow {
            x: (a.x as f64 + t * (b.x as f64 - a.x as f64)).round() as u32,
            y: (a.y as f64 + t * (b.y as f64 - a.y as f64)).round() as u32,
            width: a.width,
            height: a.height,
        }
    }

    /// Whether the window lies entirely inside a frame of the given size.
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.x as u64 + self.width as u64 <= frame_width as u64
            && self.y as u64 + self.height as u64 <= frame_height as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_center_and_area() {
        let d = Detection::new(100, 50, 81, 40, 0.9);
        assert_eq!(d.center(), (140.0, 70.0));
        assert_eq!(d.area(), 3240);
    }

    #[test]
    fn test_detection_clamped_to_frame() {
        let d = Detection::clamped(-20.0, 10.0, 100.0, 50.0, 1.4, 640, 360).unwrap();
        assert_eq!((d.x, d.y, d.width, d.height), (0, 10, 80, 50));
        assert_eq!(d.confidence, 1.0);

        let d = Detection::clamped(600.0, 330.0, 100.0, 100.0, 0.8, 640, 360).unwrap();
        assert_eq!((d.x, d.y, d.width, d.height), (600, 330, 40, 30));

        assert!(Detection::clamped(700.0, 10.0, 50.0, 50.0, 0.9, 640, 360).is_none());
        assert!(Detection::clamped(f64::NAN, 0.0, 10.0, 10.0, 0.9, 640, 360).is_none());
    }

    #[test]
    fn test_crop_window_lerp_keeps_size() {
        let a = CropWindow::new(100, 0, 608, 1080);
        let b = CropWindow::new(200, 40, 608, 1080);
        let mid = CropWindow::lerp(&a, &b, 0.5);
        assert_eq!(mid, CropWindow::new(150, 20, 608, 1080));
        assert_eq!(CropWindow::lerp(&a, &b, 0.0), a);
        assert_eq!(CropWindow::lerp(&a, &b, 1.0).x, 200);
    }

    #[test]
    fn test_crop_window_lerp_moving_left() {
        let a = CropWindow::new(300, 0, 608, 1080);
        let b = CropWindow::new(100, 0, 608, 1080);
        assert_eq!(CropWindow::lerp(&a, &b, 0.25).x, 250);
    }
}
