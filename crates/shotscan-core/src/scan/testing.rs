//! Scripted stand-ins for the video and the HUD. The script maps a frame's time in
//! seconds to what the HUD shows at that moment.

use anyhow::{bail, Result};
use image::RgbImage;

use crate::analysis::digits::CounterRead;
use crate::analysis::weapons::WeaponId;
use crate::analysis::{DebugRegion, Hud};
use crate::video::frame::Frame;
use crate::video::FrameSource;

type Timed<T> = Box<dyn Fn(f64) -> T>;

pub struct Script {
    weapon: Timed<Option<&'static str>>,
    counter: Timed<Option<u32>>,
    unlimited: Timed<bool>,
}

impl Script {
    pub fn new() -> Self {
        Self {
            weapon: Box::new(|_| None),
            counter: Box::new(|_| None),
            unlimited: Box::new(|_| false),
        }
    }

    pub fn weapon(mut self, f: impl Fn(f64) -> Option<&'static str> + 'static) -> Self {
        self.weapon = Box::new(f);
        self
    }

    pub fn weapon_always(self, id: &'static str) -> Self {
        self.weapon(move |_| Some(id))
    }

    pub fn counter(mut self, f: impl Fn(f64) -> u32 + 'static) -> Self {
        self.counter = Box::new(move |t| Some(f(t)));
        self
    }

    /// Counter that may be unreadable.
    pub fn counter_opt(mut self, f: impl Fn(f64) -> Option<u32> + 'static) -> Self {
        self.counter = Box::new(f);
        self
    }

    pub fn unlimited(mut self, f: impl Fn(f64) -> bool + 'static) -> Self {
        self.unlimited = Box::new(f);
        self
    }
}

pub struct ScriptedHud {
    script: Script,
}

impl ScriptedHud {
    pub fn new(script: Script) -> Self {
        Self { script }
    }
}

impl Hud for ScriptedHud {
    fn active_weapon(&self, frame: &Frame) -> Option<WeaponId> {
        (self.script.weapon)(frame.timestamp_seconds).map(WeaponId::from)
    }

    fn is_weapon_active(&self, frame: &Frame, weapon: &WeaponId) -> bool {
        (self.script.weapon)(frame.timestamp_seconds) == Some(weapon.as_str())
    }

    fn read_counter(&self, frame: &Frame) -> CounterRead {
        (self.script.counter)(frame.timestamp_seconds).map_or(CounterRead::NotFound, CounterRead::Value)
    }

    fn unlimited_icon_active(&self, frame: &Frame) -> bool {
        (self.script.unlimited)(frame.timestamp_seconds)
    }

    fn debug_regions(&self) -> Vec<DebugRegion> {
        Vec::new()
    }
}

/// Frames are 1x1 pixels; only their index and time matter.
pub struct ScriptedSource {
    fps: f64,
    frame_count: u32,
    failing: Box<dyn Fn(u32) -> bool>,
    visited: Vec<u32>,
}

impl ScriptedSource {
    pub fn new(fps: f64, frame_count: u32) -> Self {
        Self {
            fps,
            frame_count,
            failing: Box::new(|_| false),
            visited: Vec::new(),
        }
    }

    /// Frames for which `f` holds fail to decode.
    pub fn failing(mut self, f: impl Fn(u32) -> bool + 'static) -> Self {
        self.failing = Box::new(f);
        self
    }

    /// Every index requested so far, in order.
    pub fn visited(&self) -> &[u32] {
        &self.visited
    }
}

impl FrameSource for ScriptedSource {
    fn width(&self) -> u32 {
        1
    }

    fn height(&self) -> u32 {
        1
    }

    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u32 {
        self.frame_count
    }

    fn frame_at(&mut self, index: u32) -> Result<Frame> {
        self.visited.push(index);
        if index >= self.frame_count {
            bail!("frame {index} past end of video ({} frames)", self.frame_count);
        }
        if (self.failing)(index) {
            bail!("scripted decode failure at frame {index}");
        }
        Ok(Frame {
            image: RgbImage::new(1, 1),
            index,
            timestamp_seconds: index as f64 / self.fps,
        })
    }
}
