use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use tracing::{debug, info, warn};

use crate::analysis::weapons::WeaponId;
use crate::analysis::Hud;
use crate::scan::coarse::ScanObserver;
use crate::scan::state::CoarseDecision;
use crate::timestamp::format_hms;
use crate::video::frame::Frame;

const TEXT_SCALE: f32 = 28.0;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT_LINE_HEIGHT: i32 = 30;

/// Saves decisive coarse frames with HUD region markers, analysis text and the binarized crops.
pub struct DebugRenderer {
    dir: PathBuf,
    font: Option<FontVec>,
    saved: usize,
}

impl DebugRenderer {
    /// Text is drawn only when `font_path` names a readable TrueType/OpenType font.
    pub fn new(dir: &Path, font_path: Option<&Path>) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create debug frames directory {}", dir.display()))?;
        info!(?dir, "debug frames directory ready");
        Ok(Self {
            dir: dir.to_path_buf(),
            font: font_path.and_then(load_font),
            saved: 0,
        })
    }

    /// Number of frames written so far.
    pub fn saved(&self) -> usize {
        self.saved
    }

    pub fn save_frame(
        &mut self,
        frame: &Frame,
        weapon: &WeaponId,
        decision: &CoarseDecision,
        hud: &dyn Hud,
    ) -> Result<()> {
        let mut img = frame.image.clone();

        for region in hud.debug_regions() {
            let rect = Rect::at(region.roi.x1 as i32, region.roi.y1 as i32)
                .of_size(region.roi.width(), region.roi.height());
            draw_hollow_rect_mut(&mut img, rect, region.color);
        }

        self.draw_text_overlay(&mut img, frame, weapon, decision);

        let stem = format!("frame_{:08}_{}", frame.index, weapon);
        let path = self.dir.join(format!("{stem}.png"));
        img.save(&path)
            .with_context(|| format!("failed to save debug frame to {}", path.display()))?;

        for (name, crop) in hud.binarized_regions(frame) {
            let crop_path = self.dir.join(format!("{stem}_{name}.png"));
            crop.as_gray()
                .save(&crop_path)
                .with_context(|| format!("failed to save debug crop to {}", crop_path.display()))?;
        }

        self.saved += 1;
        debug!(?path, "saved debug frame");
        Ok(())
    }

    fn draw_text_overlay(&self, img: &mut RgbImage, frame: &Frame, weapon: &WeaponId, decision: &CoarseDecision) {
        let Some(font) = &self.font else { return };
        let scale = PxScale::from(TEXT_SCALE);
        let x = 10;
        let mut y = 10;

        let header = format!("F:{} {}", frame.index, format_hms(frame.timestamp_seconds));
        draw_text_mut(img, TEXT_COLOR, x, y, scale, font, &header);
        y += TEXT_LINE_HEIGHT;

        draw_text_mut(img, TEXT_COLOR, x, y, scale, font, &format!("W:{weapon}"));
        y += TEXT_LINE_HEIGHT;

        draw_text_mut(img, TEXT_COLOR, x, y, scale, font, &decision_text(decision));
    }
}

impl ScanObserver for DebugRenderer {
    fn on_decision(&mut self, frame: &Frame, weapon: &WeaponId, decision: &CoarseDecision, hud: &dyn Hud) {
        if let Err(e) = self.save_frame(frame, weapon, decision, hud) {
            warn!(frame = frame.index, error = %e, "debug frame not saved");
        }
    }
}

fn decision_text(decision: &CoarseDecision) -> String {
    match decision {
        CoarseDecision::Shot(w) => format!("SHOT {}->{} [{}..{}]", w.prev_value, w.curr_value, w.start_frame, w.end_frame),
        CoarseDecision::ResourceWindowStart => "INFINITE".to_string(),
        CoarseDecision::Idle => "-".to_string(),
    }
}

fn load_font(path: &Path) -> Option<FontVec> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!(?path, error = %e, "failed to read font file");
            return None;
        }
    };
    match FontVec::try_from_vec(data) {
        Ok(font) => {
            info!(?path, "loaded debug font");
            Some(font)
        }
        Err(e) => {
            warn!(?path, error = %e, "failed to parse font file");
            None
        }
    }
}
