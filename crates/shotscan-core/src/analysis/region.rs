use image::{imageops, GrayImage, RgbImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use thiserror::Error;
use tracing::debug;

use crate::rect::Roi;

/// Gray level used when binarizing reference templates read from disk.
pub const TEMPLATE_LEVEL: u8 = 127;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegionError {
    #[error("region ({x1},{y1})-({x2},{y2}) lies outside the {frame_width}x{frame_height} frame")]
    OutOfBounds {
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        frame_width: u32,
        frame_height: u32,
    },
}

/// A two-level image: every pixel is either foreground (255) or background (0).
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryImage(GrayImage);

impl BinaryImage {
    /// Binarize with a fixed cutoff: pixels strictly above `level` become foreground.
    pub fn from_gray_fixed(gray: &GrayImage, level: u8) -> Self {
        Self(threshold(gray, level, ThresholdType::Binary))
    }

    /// Binarize with a cutoff chosen to maximize inter-class variance (Otsu).
    pub fn from_gray_otsu(gray: &GrayImage) -> Self {
        let level = otsu_level(gray);
        debug!(level, "otsu threshold selected");
        Self::from_gray_fixed(gray, level)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        self.0.get_pixel(x, y).0[0] != 0
    }

    /// Foreground flags in row-major order.
    pub fn foreground(&self) -> impl Iterator<Item = bool> + '_ {
        self.0.pixels().map(|p| p.0[0] != 0)
    }

    pub fn foreground_count(&self) -> usize {
        self.foreground().filter(|&fg| fg).count()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.0
    }
}

/// Crop `roi` out of `frame`, convert it to grayscale and binarize it with Otsu's method.
pub fn extract_binary(frame: &RgbImage, roi: &Roi) -> Result<BinaryImage, RegionError> {
    let (frame_width, frame_height) = frame.dimensions();
    if !roi.fits_within(frame_width, frame_height) {
        return Err(RegionError::OutOfBounds {
            x1: roi.x1,
            y1: roi.y1,
            x2: roi.x2,
            y2: roi.y2,
            frame_width,
            frame_height,
        });
    }

    let crop = imageops::crop_imm(frame, roi.x1, roi.y1, roi.width(), roi.height()).to_image();
    let gray = imageops::grayscale(&crop);
    Ok(BinaryImage::from_gray_otsu(&gray))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};

    use crate::testutil::frame_with_block;

    #[test]
    fn extract_binarizes_bright_block_as_foreground() {
        let frame = frame_with_block(100, 50, 30, 10, 10, 10);
        let bin = extract_binary(&frame, &Roi::new(25, 5, 45, 25)).unwrap();
        assert_eq!(bin.dimensions(), (20, 20));
        assert_eq!(bin.foreground_count(), 100);
        assert!(bin.is_foreground(5, 5));
        assert!(!bin.is_foreground(0, 0));
    }

    #[test]
    fn otsu_adapts_to_lighting() {
        // Same shape under a much darker overlay still separates cleanly.
        let frame = RgbImage::from_fn(20, 20, |x, _| {
            if x < 5 {
                Rgb([90, 90, 90])
            } else {
                Rgb([40, 40, 40])
            }
        });
        let bin = extract_binary(&frame, &Roi::new(0, 0, 20, 20)).unwrap();
        assert_eq!(bin.foreground_count(), 100);
        assert!(bin.is_foreground(0, 10));
        assert!(!bin.is_foreground(10, 10));
    }

    #[test]
    fn extract_rejects_roi_outside_frame() {
        let frame = frame_with_block(100, 50, 0, 0, 1, 1);
        let err = extract_binary(&frame, &Roi::new(90, 0, 101, 10)).unwrap_err();
        assert_eq!(
            err,
            RegionError::OutOfBounds {
                x1: 90,
                y1: 0,
                x2: 101,
                y2: 10,
                frame_width: 100,
                frame_height: 50
            }
        );
        assert!(extract_binary(&frame, &Roi::new(10, 10, 10, 20)).is_err());
    }

    #[test]
    fn fixed_level_is_strictly_greater() {
        let gray = GrayImage::from_fn(3, 1, |x, _| Luma([[126u8, 127, 128][x as usize]]));
        let bin = BinaryImage::from_gray_fixed(&gray, TEMPLATE_LEVEL);
        assert_eq!(bin.foreground().collect::<Vec<_>>(), vec![false, false, true]);
    }
}
