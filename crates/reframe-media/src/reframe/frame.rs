//! Decoded frames and cropping.

use image::{imageops, RgbImage};

use super::models::CropWindow;
use crate::error::{MediaError, MediaResult};

/// One decoded frame, packed RGB24.
pub type Frame = RgbImage;

/// Bytes per pixel of [`Frame`].
pub const CHANNELS: usize = 3;

/// Raw byte length of a `width x height` frame.
pub fn frame_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}

/// Wrap raw RGB24 bytes into a frame.
pub fn frame_from_bytes(width: u32, height: u32, bytes: Vec<u8>) -> MediaResult<Frame> {
    let len = bytes.len();
    RgbImage::from_raw(width, height, bytes).ok_or_else(|| {
        MediaError::decode_failure(format!(
            "{} bytes do not form a {}x{} RGB frame",
            len, width, height
        ))
    })
}

/// Extract the window region of `frame`.
pub fn crop_frame(frame: &Frame, window: &CropWindow) -> MediaResult<Frame> {
    if !window.fits_within(frame.width(), frame.height()) {
        return Err(MediaError::validation(format!(
            "crop window {}x{}+{}+{} exceeds frame {}x{}",
            window.width,
            window.height,
            window.x,
            window.y,
            frame.width(),
            frame.height()
        )));
    }
    Ok(imageops::crop_imm(frame, window.x, window.y, window.width, window.height).to_image())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_crop_extracts_region() {
        let frame = RgbImage::from_fn(8, 4, |x, y| Rgb([x as u8, y as u8, 0]));
        let cropped = crop_frame(&frame, &CropWindow::new(2, 1, 4, 2)).unwrap();
        assert_eq!(cropped.dimensions(), (4, 2));
        assert_eq!(cropped.get_pixel(0, 0), &Rgb([2, 1, 0]));
        assert_eq!(cropped.get_pixel(3, 1), &Rgb([5, 2, 0]));
    }

    #[test]
    fn test_crop_outside_frame_rejected() {
        let frame = RgbImage::new(8, 4);
        assert!(crop_frame(&frame, &CropWindow::new(6, 0, 4, 4)).is_err());
    }

    #[test]
    fn test_frame_from_bytes_checks_length() {
        assert!(frame_from_bytes(2, 2, vec![0; frame_len(2, 2)]).is_ok());
        assert!(matches!(
            frame_from_bytes(2, 2, vec![0; 5]),
            Err(MediaError::DecodeFailure(_))
        ));
    }
}
