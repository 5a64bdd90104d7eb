use crate::analysis::digits::CounterRead;

/// What the coarse scanner remembers about one weapon between samples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanState {
    /// Last counter value read while the weapon was active. None until the first read.
    pub last_value: Option<u32>,
    /// Frame at which `last_value` was read.
    pub last_updated_frame: u32,
    /// Last coarse frame at which the weapon was in hand.
    pub last_active_frame: u32,
    /// Whether the unlimited-resource icon was showing at the last check.
    pub unlimited_active: bool,
}

/// A coarse interval in which the counter changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShotWindow {
    pub start_frame: u32,
    pub end_frame: u32,
    /// Counter at `start_frame`.
    pub prev_value: u32,
    /// Counter at `end_frame`.
    pub curr_value: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoarseDecision {
    /// Refine this window with the fine scanner.
    Shot(ShotWindow),
    /// The unlimited icon just appeared; record the sample time as is.
    ResourceWindowStart,
    Idle,
}

/// One coarse sample of an active weapon.
#[derive(Debug, Clone, Copy)]
pub struct Observation {
    pub frame_index: u32,
    pub reading: CounterRead,
    /// Unlimited icon state, or None when it was not checked.
    pub unlimited_icon: Option<bool>,
}

impl ScanState {
    /// The window to refine if `reading` differs from the last known value.
    /// With no previous value the reading is only a baseline.
    pub fn pending_shot(&self, frame_index: u32, reading: CounterRead) -> Option<ShotWindow> {
        let (Some(prev_value), Some(curr_value)) = (self.last_value, reading.value()) else {
            return None;
        };
        (prev_value != curr_value).then_some(ShotWindow {
            start_frame: self.last_updated_frame,
            end_frame: frame_index,
            prev_value,
            curr_value,
        })
    }

    /// Decide what a sample of the active weapon means and return the state after it.
    pub fn observe(&self, obs: Observation) -> (CoarseDecision, ScanState) {
        let mut next = self.clone();
        next.last_active_frame = obs.frame_index;

        let decision = if let Some(window) = self.pending_shot(obs.frame_index, obs.reading) {
            next.unlimited_active = false;
            CoarseDecision::Shot(window)
        } else if let Some(showing) = obs.unlimited_icon {
            next.unlimited_active = showing;
            if showing && !self.unlimited_active {
                CoarseDecision::ResourceWindowStart
            } else {
                CoarseDecision::Idle
            }
        } else {
            CoarseDecision::Idle
        };

        if let Some(value) = obs.reading.value() {
            next.last_value = Some(value);
            next.last_updated_frame = obs.frame_index;
        }
        (decision, next)
    }

    /// State after a sample in which this weapon was not in hand.
    pub fn put_away(&self) -> ScanState {
        ScanState {
            unlimited_active: false,
            ..self.clone()
        }
    }
}
