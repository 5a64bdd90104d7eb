use serde::{Deserialize, Serialize};

/// A rectangle in absolute pixel coordinates, `x1..x2` by `y1..y2` (end-exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Roi {
    pub const fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    /// True when the rectangle is non-empty and lies fully inside a frame of the given size.
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2 && self.x2 <= frame_width && self.y2 <= frame_height
    }
}

/// The two-digit counter region, split vertically into a left and a right digit slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRoi {
    pub roi: Roi,
    /// Absolute x coordinate separating the two slots.
    pub split_x: u32,
}

impl CounterRoi {
    pub fn left(&self) -> Roi {
        Roi::new(self.roi.x1, self.roi.y1, self.split_x, self.roi.y2)
    }

    pub fn right(&self) -> Roi {
        Roi::new(self.split_x, self.roi.y1, self.roi.x2, self.roi.y2)
    }

    /// The split must fall strictly inside the region, otherwise one slot is empty.
    pub fn is_split_valid(&self) -> bool {
        self.roi.x1 < self.split_x && self.split_x < self.roi.x2
    }
}
