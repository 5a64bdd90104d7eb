use image::RgbImage;

/// A single decoded video frame with metadata.
pub struct Frame {
    /// The frame's image data.
    pub image: RgbImage,
    /// Absolute frame index from the start of the source (0-based).
    pub index: u32,
    /// Elapsed seconds from the start of the source.
    pub timestamp_seconds: f64,
}
