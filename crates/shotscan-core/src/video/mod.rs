pub mod decoder;
pub mod frame;

use anyhow::Result;

use frame::Frame;

/// Random-access access to the frames of one video.
pub trait FrameSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn fps(&self) -> f64;
    fn frame_count(&self) -> u32;

    /// Decode the frame at `index`. Blocks until the frame is available.
    fn frame_at(&mut self, index: u32) -> Result<Frame>;

    /// Convert an interval in seconds to a frame stride of at least one frame.
    fn stride_for(&self, seconds: f64) -> u32 {
        ((self.fps() * seconds) as u32).max(1)
    }
}
