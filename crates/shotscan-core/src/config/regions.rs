//! HUD layout of the reference 1920x1080 recording.

use crate::rect::{CounterRoi, Roi};

pub const REF_WIDTH: u32 = 1920;
pub const REF_HEIGHT: u32 = 1080;

/// Two-digit ammo counter, bottom right.
pub const COUNTER: CounterRoi = CounterRoi {
    roi: Roi::new(1723, 958, 1787, 1002),
    split_x: 1754,
};

/// Icon of the weapon currently in hand.
pub const WEAPON: Roi = Roi::new(1554, 958, 1702, 998);

/// Where the unlimited-resource marker replaces the counter.
pub const UNLIMITED: Roi = Roi::new(1723, 964, 1782, 993);
