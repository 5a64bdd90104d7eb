pub mod digits;
pub mod region;
pub mod score;
pub mod templates;
pub mod weapons;

use image::Rgb;
use tracing::{debug, info, warn};

use crate::config::{regions, ScanConfig};
use crate::rect::{CounterRoi, Roi};
use crate::video::frame::Frame;
use digits::{classify_digit, combine_digits, CounterRead, DigitRead};
use region::{extract_binary, BinaryImage};
use templates::{DigitSlot, TemplateLibrary};
use weapons::{classify_weapon, matches_icon, WeaponId};

/// A region to draw on debug frames.
pub struct DebugRegion {
    pub roi: Roi,
    pub color: Rgb<u8>,
}

/// What the scanners need to know about one frame's HUD.
pub trait Hud {
    /// The weapon whose icon best matches the frame, if it clears the activation threshold.
    fn active_weapon(&self, frame: &Frame) -> Option<WeaponId>;

    /// Whether `weapon`'s own icon clears the activation threshold in the frame.
    fn is_weapon_active(&self, frame: &Frame, weapon: &WeaponId) -> bool;

    /// Read the two-digit counter.
    fn read_counter(&self, frame: &Frame) -> CounterRead;

    /// Whether the unlimited-resource icon is showing.
    fn unlimited_icon_active(&self, frame: &Frame) -> bool;

    /// Return the regions to draw on debug frames.
    fn debug_regions(&self) -> Vec<DebugRegion>;

    /// Binarized crops of the frame's regions, named, for debug output.
    fn binarized_regions(&self, _frame: &Frame) -> Vec<(&'static str, BinaryImage)> {
        Vec::new()
    }
}

/// Reads the HUD by template matching binarized regions of the frame.
pub struct TemplateHud {
    templates: TemplateLibrary,
    /// None when the region does not fit the frame; every read then fails.
    counter: Option<CounterRoi>,
    weapon_roi: Option<Roi>,
    unlimited_roi: Option<Roi>,
    weapon_threshold: f64,
    unlimited_threshold: f64,
    digit_floor: f64,
}

impl TemplateHud {
    pub fn new(frame_width: u32, frame_height: u32, config: &ScanConfig, templates: TemplateLibrary) -> Self {
        if (frame_width, frame_height) != (regions::REF_WIDTH, regions::REF_HEIGHT) {
            warn!(
                frame_width,
                frame_height,
                ref_width = regions::REF_WIDTH,
                ref_height = regions::REF_HEIGHT,
                "frame size differs from the reference layout, regions are used as configured"
            );
        }

        let counter = Some(config.counter_roi).filter(|c| {
            let fits = checked_roi("counter", c.roi, frame_width, frame_height).is_some();
            if fits && !c.is_split_valid() {
                warn!(split_x = c.split_x, roi = ?c.roi, "counter split outside region, counter never reads");
                return false;
            }
            fits
        });
        let weapon_roi = checked_roi("weapon", config.weapon_roi, frame_width, frame_height);
        let unlimited_roi = checked_roi("unlimited", config.unlimited_roi, frame_width, frame_height);

        info!(
            frame_width,
            frame_height,
            counter = ?counter,
            weapon = ?weapon_roi,
            unlimited = ?unlimited_roi,
            weapon_threshold = config.weapon_threshold,
            unlimited_threshold = config.unlimited_threshold,
            digit_floor = config.digit_floor,
            "template HUD initialized"
        );

        Self {
            templates,
            counter,
            weapon_roi,
            unlimited_roi,
            weapon_threshold: config.weapon_threshold,
            unlimited_threshold: config.unlimited_threshold,
            digit_floor: config.digit_floor,
        }
    }

    fn region(&self, frame: &Frame, roi: Option<Roi>) -> Option<BinaryImage> {
        let roi = roi?;
        match extract_binary(&frame.image, &roi) {
            Ok(bin) => Some(bin),
            Err(e) => {
                debug!(frame = frame.index, error = %e, "region unavailable");
                None
            }
        }
    }

    fn read_slot(&self, frame: &Frame, roi: Roi, slot: DigitSlot) -> DigitRead {
        match self.region(frame, Some(roi)) {
            Some(bin) => classify_digit(&bin, self.templates.digits.bank(slot), self.digit_floor),
            None => DigitRead::NotFound,
        }
    }
}

/// `roi` if it fits the frame, otherwise None with a warning.
fn checked_roi(name: &str, roi: Roi, frame_width: u32, frame_height: u32) -> Option<Roi> {
    if roi.fits_within(frame_width, frame_height) {
        Some(roi)
    } else {
        warn!(
            region = name,
            ?roi,
            frame_width,
            frame_height,
            "region outside frame, every sample of it reads nothing"
        );
        None
    }
}

impl Hud for TemplateHud {
    fn active_weapon(&self, frame: &Frame) -> Option<WeaponId> {
        let region = self.region(frame, self.weapon_roi)?;
        classify_weapon(&region, &self.templates.icons, self.weapon_threshold)
    }

    fn is_weapon_active(&self, frame: &Frame, weapon: &WeaponId) -> bool {
        let Some(icon) = self.templates.icons.get(weapon) else {
            return false;
        };
        self.region(frame, self.weapon_roi)
            .is_some_and(|region| matches_icon(&region, icon, self.weapon_threshold))
    }

    fn read_counter(&self, frame: &Frame) -> CounterRead {
        let Some(counter) = self.counter else {
            return CounterRead::NotFound;
        };
        let left = self.read_slot(frame, counter.left(), DigitSlot::Left);
        let right = self.read_slot(frame, counter.right(), DigitSlot::Right);
        let read = combine_digits(left, right);
        debug!(frame = frame.index, ?left, ?right, ?read, "counter read");
        read
    }

    fn unlimited_icon_active(&self, frame: &Frame) -> bool {
        let Some(icon) = &self.templates.unlimited_icon else {
            return false;
        };
        self.region(frame, self.unlimited_roi)
            .is_some_and(|region| matches_icon(&region, icon, self.unlimited_threshold))
    }

    fn debug_regions(&self) -> Vec<DebugRegion> {
        let mut regions = Vec::new();
        if let Some(counter) = self.counter {
            regions.push(DebugRegion {
                roi: counter.left(),
                color: Rgb([0, 255, 0]),
            });
            regions.push(DebugRegion {
                roi: counter.right(),
                color: Rgb([0, 160, 0]),
            });
        }
        if let Some(roi) = self.weapon_roi {
            regions.push(DebugRegion {
                roi,
                color: Rgb([0, 100, 255]),
            });
        }
        if let Some(roi) = self.unlimited_roi {
            regions.push(DebugRegion {
                roi,
                color: Rgb([255, 200, 0]),
            });
        }
        regions
    }

    fn binarized_regions(&self, frame: &Frame) -> Vec<(&'static str, BinaryImage)> {
        let mut crops = Vec::new();
        if let Some(counter) = self.counter {
            crops.extend(self.region(frame, Some(counter.left())).map(|b| ("left", b)));
            crops.extend(self.region(frame, Some(counter.right())).map(|b| ("right", b)));
        }
        crops.extend(self.region(frame, self.weapon_roi).map(|b| ("weapon", b)));
        crops.extend(self.region(frame, self.unlimited_roi).map(|b| ("unlimited", b)));
        crops
    }
}
