use tracing::debug;

use super::region::BinaryImage;

/// Intersection-over-union of the foreground pixels of two binary images.
///
/// Returns 0.0 when the dimensions differ (routine when ROI and template geometry
/// drift apart) and 1.0 when both images are entirely background.
pub fn iou_score(a: &BinaryImage, b: &BinaryImage) -> f64 {
    if a.dimensions() != b.dimensions() {
        debug!(
            a = ?a.dimensions(),
            b = ?b.dimensions(),
            "size mismatch, scoring 0"
        );
        return 0.0;
    }

    let (intersection, union) = a
        .foreground()
        .zip(b.foreground())
        .fold((0u64, 0u64), |(i, u), (fa, fb)| {
            (i + (fa && fb) as u64, u + (fa || fb) as u64)
        });

    if union == 0 {
        return 1.0;
    }
    intersection as f64 / union as f64
}
