//! Synthetic images and scratch directories shared by unit tests.

use std::path::PathBuf;

use image::{GrayImage, Luma, Rgb, RgbImage};

use crate::analysis::region::{BinaryImage, TEMPLATE_LEVEL};
use crate::rect::Roi;

pub const BRIGHT: u8 = 230;
pub const DARK: u8 = 20;

pub fn binary_from_fn(w: u32, h: u32, f: impl Fn(u32, u32) -> bool) -> BinaryImage {
    let gray = GrayImage::from_fn(w, h, |x, y| Luma([if f(x, y) { 255 } else { 0 }]));
    BinaryImage::from_gray_fixed(&gray, TEMPLATE_LEVEL)
}

/// Dark frame with a bright block at `(bx, by)` of size `bw`x`bh`.
pub fn frame_with_block(w: u32, h: u32, bx: u32, by: u32, bw: u32, bh: u32) -> RgbImage {
    let mut frame = RgbImage::from_pixel(w, h, Rgb([DARK, DARK, DARK]));
    paint(&mut frame, &Roi::new(bx, by, bx + bw, by + bh), |_, _| true);
    frame
}

/// Paint the pixels of `roi` for which `f(x, y)` (ROI-relative) holds bright, the rest dark.
pub fn paint(frame: &mut RgbImage, roi: &Roi, f: impl Fn(u32, u32) -> bool) {
    for y in roi.y1..roi.y2 {
        for x in roi.x1..roi.x2 {
            let v = if f(x - roi.x1, y - roi.y1) { BRIGHT } else { DARK };
            frame.put_pixel(x, y, Rgb([v, v, v]));
        }
    }
}

/// Glyph for a digit: a full-height bar whose horizontal position encodes the value.
/// Distinct digits never overlap, so their IoU is zero.
pub fn digit_glyph(digit: u8) -> impl Fn(u32, u32) -> bool {
    let start = 1 + digit as u32 * 2;
    move |x, _| x >= start && x < start + 2
}

/// Glyph for weapon icon number `n`: a full-width band at row `n`.
pub fn icon_glyph(n: u32) -> impl Fn(u32, u32) -> bool {
    move |_, y| y == n * 2 || y == n * 2 + 1
}

pub fn glyph_png(w: u32, h: u32, f: impl Fn(u32, u32) -> bool) -> GrayImage {
    GrayImage::from_fn(w, h, |x, y| Luma([if f(x, y) { 255 } else { 0 }]))
}

/// A fresh, empty directory under the system temp dir, unique per test name.
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("shotscan-test-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
