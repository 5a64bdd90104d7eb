use std::collections::HashMap;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use super::fine::refine_window;
use super::state::{CoarseDecision, Observation, ScanState};
use super::ScanSettings;
use crate::analysis::weapons::{WeaponId, WeaponProfile};
use crate::analysis::Hud;
use crate::events::{Event, EventRecorder, EventSink};
use crate::timestamp::format_hms;
use crate::video::frame::Frame;
use crate::video::FrameSource;

/// Notified of every coarse sample that led to an event.
pub trait ScanObserver {
    fn on_decision(&mut self, frame: &Frame, weapon: &WeaponId, decision: &CoarseDecision, hud: &dyn Hud);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub coarse_samples: u32,
    pub windows_refined: u32,
    pub shots_recorded: u32,
    pub resource_windows_recorded: u32,
    /// A coarse frame could not be decoded before the end of the video.
    pub ended_early: bool,
}

/// Walks the video at the coarse stride, tracking each selected weapon.
pub struct CoarseScanner<'a> {
    hud: &'a dyn Hud,
    weapons: Vec<&'a WeaponProfile>,
    settings: ScanSettings,
    states: HashMap<WeaponId, ScanState>,
}

impl<'a> CoarseScanner<'a> {
    /// `weapons` are the selected weapons, in the order progress is reported.
    pub fn new(hud: &'a dyn Hud, weapons: Vec<&'a WeaponProfile>, settings: ScanSettings) -> Self {
        Self {
            hud,
            weapons,
            settings,
            states: HashMap::new(),
        }
    }

    pub fn state(&self, weapon: &WeaponId) -> Option<&ScanState> {
        self.states.get(weapon)
    }

    fn selected(&self, id: &WeaponId) -> Option<&'a WeaponProfile> {
        self.weapons.iter().copied().find(|p| &p.id == id)
    }

    /// Scan from the start frame to the end of the video. Stops early, keeping what was
    /// recorded, when a coarse frame cannot be decoded.
    pub fn run<S, K>(
        &mut self,
        source: &mut S,
        recorder: &mut EventRecorder<K>,
        mut observer: Option<&mut dyn ScanObserver>,
    ) -> Result<ScanStats>
    where
        S: FrameSource + ?Sized,
        K: EventSink,
    {
        let frame_count = source.frame_count();
        let stride = self.settings.strides.coarse;
        let progress_every = stride.saturating_mul(5);
        let mut stats = ScanStats::default();
        let mut last_progress: Option<u32> = None;
        let mut iteration: u32 = 0;
        let mut index = self.settings.start_frame;

        if index >= frame_count {
            warn!(start_frame = index, frame_count, "start offset is past the end of the video");
        }
        info!(
            start_frame = index,
            frame_count,
            coarse_stride = stride,
            fine_stride = self.settings.strides.fine,
            weapons = self.weapons.len(),
            "coarse scan starting"
        );

        while index < frame_count {
            let frame = match source.frame_at(index) {
                Ok(frame) => frame,
                Err(e) => {
                    error!(frame = index, error = %e, "coarse frame unreadable, ending scan");
                    stats.ended_early = true;
                    break;
                }
            };
            stats.coarse_samples += 1;

            if last_progress.map_or(true, |at| index >= at.saturating_add(progress_every)) {
                self.log_progress(&frame, frame_count);
                last_progress = Some(index);
            }

            let outcome = self.sample(source, &frame, recorder, &mut stats);
            if let (Some(observer), Some((weapon, decision))) = (observer.as_mut(), outcome) {
                observer.on_decision(&frame, &weapon, &decision, self.hud);
            }

            if iteration > 0 && iteration % self.settings.flush_every == 0 {
                recorder.flush()?;
                recorder.forget_before(self.dedup_horizon(index, source.fps()));
                debug!(remembered = recorder.remembered(), "dedup index pruned");
            }
            iteration += 1;
            index = index.saturating_add(stride);
        }

        info!(
            samples = stats.coarse_samples,
            windows = stats.windows_refined,
            shots = stats.shots_recorded,
            resource_windows = stats.resource_windows_recorded,
            ended_early = stats.ended_early,
            "coarse scan finished"
        );
        Ok(stats)
    }

    /// Earliest time, in seconds, a later sample can still record an event at.
    /// Later windows open at some weapon's last read, and fine passes stay within the lead-in of it.
    fn dedup_horizon(&self, index: u32, fps: f64) -> f64 {
        let earliest = self
            .states
            .values()
            .filter(|s| s.last_value.is_some())
            .map(|s| s.last_updated_frame)
            .min()
            .map_or(index, |frame| frame.min(index));
        earliest as f64 / fps - self.settings.lead_in_secs
    }

    /// Handle one coarse frame. Returns the decision when it was not idle.
    fn sample<S, K>(
        &mut self,
        source: &mut S,
        frame: &Frame,
        recorder: &mut EventRecorder<K>,
        stats: &mut ScanStats,
    ) -> Option<(WeaponId, CoarseDecision)>
    where
        S: FrameSource + ?Sized,
        K: EventSink,
    {
        let hud = self.hud;
        let Some(profile) = hud.active_weapon(frame).and_then(|id| self.selected(&id)) else {
            debug!(frame = frame.index, "no selected weapon in hand");
            for state in self.states.values_mut().filter(|s| s.unlimited_active) {
                *state = state.put_away();
            }
            return None;
        };

        let state = self.states.get(&profile.id).cloned().unwrap_or_default();
        let reading = hud.read_counter(frame);
        let unlimited_icon = (profile.has_unlimited_icon
            && state.pending_shot(frame.index, reading).is_none())
        .then(|| hud.unlimited_icon_active(frame));
        debug!(
            frame = frame.index,
            weapon = %profile.id,
            ?reading,
            ?unlimited_icon,
            "coarse sample"
        );

        let (decision, next) = state.observe(Observation {
            frame_index: frame.index,
            reading,
            unlimited_icon,
        });
        self.states.insert(profile.id.clone(), next);

        match decision {
            CoarseDecision::Shot(window) => {
                info!(
                    weapon = %profile.id,
                    from = %format_hms(window.start_frame as f64 / source.fps()),
                    to = %format_hms(frame.timestamp_seconds),
                    prev = window.prev_value,
                    curr = window.curr_value,
                    "counter changed, refining"
                );
                stats.windows_refined += 1;
                let shots = refine_window(
                    source,
                    hud,
                    profile,
                    &window,
                    &self.settings.strides,
                    self.settings.lead_in_secs,
                );
                for t in shots {
                    if recorder.record(Event::shot(&profile.id, t)) {
                        stats.shots_recorded += 1;
                    }
                }
            }
            CoarseDecision::ResourceWindowStart => {
                info!(
                    weapon = %profile.id,
                    at = %format_hms(frame.timestamp_seconds),
                    "unlimited icon appeared"
                );
                if recorder.record(Event::resource_window_start(&profile.id, frame.timestamp_seconds)) {
                    stats.resource_windows_recorded += 1;
                }
            }
            CoarseDecision::Idle => return None,
        }
        Some((profile.id.clone(), decision))
    }

    fn log_progress(&self, frame: &Frame, frame_count: u32) {
        let last_values = self
            .weapons
            .iter()
            .map(|p| {
                let value = self
                    .states
                    .get(&p.id)
                    .and_then(|s| s.last_value)
                    .map_or_else(|| "?".to_string(), |v| v.to_string());
                format!("{}={}", p.id, value)
            })
            .collect::<Vec<_>>()
            .join(", ");
        info!(
            frame = frame.index,
            frame_count,
            at = %format_hms(frame.timestamp_seconds),
            last_values,
            "coarse progress"
        );
    }
}
