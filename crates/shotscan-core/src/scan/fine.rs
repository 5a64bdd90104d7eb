use tracing::{debug, info, warn};

use super::state::ShotWindow;
use super::Strides;
use crate::analysis::weapons::WeaponProfile;
use crate::analysis::Hud;
use crate::timestamp::format_hms;
use crate::video::FrameSource;

/// Counter reading of one fine sample, taken only while the weapon is in hand.
struct FineSample {
    value: u32,
    seconds: f64,
}

fn sample<S: FrameSource + ?Sized>(
    source: &mut S,
    hud: &dyn Hud,
    weapon: &WeaponProfile,
    index: u32,
) -> Option<FineSample> {
    let frame = match source.frame_at(index) {
        Ok(frame) => frame,
        Err(e) => {
            warn!(frame = index, error = %e, "fine sample unreadable, skipping");
            return None;
        }
    };
    if !hud.is_weapon_active(&frame, &weapon.id) {
        debug!(frame = index, weapon = %weapon.id, "weapon not in hand, fine sample skipped");
        return None;
    }
    let value = hud.read_counter(&frame).value()?;
    Some(FineSample {
        value,
        seconds: frame.timestamp_seconds,
    })
}

/// Localize the counter changes inside `window` and return their shot times in seconds.
///
/// Walks backward from the window end, then forward from the window start up to the
/// lowest frame the backward walk reached. Each pass stops once it reads the counter
/// value found at the opposite end of the window. Either pass may report the same
/// change; the caller deduplicates.
pub fn refine_window<S: FrameSource + ?Sized>(
    source: &mut S,
    hud: &dyn Hud,
    weapon: &WeaponProfile,
    window: &ShotWindow,
    strides: &Strides,
    lead_in_secs: f64,
) -> Vec<f64> {
    let rule = weapon.rule;
    let fine = strides.fine;
    let reach = strides.coarse + strides.fine;
    let mut shots = Vec::new();
    let mut record = |at: &FineSample, earlier: u32, later: u32| {
        let shot = (at.seconds - lead_in_secs).max(0.0);
        info!(
            weapon = %weapon.id,
            %rule,
            at = %format_hms(at.seconds),
            shot = %format_hms(shot),
            earlier,
            later,
            "shot localized"
        );
        shots.push(shot);
    };

    info!(
        weapon = %weapon.id,
        %rule,
        start = window.start_frame,
        end = window.end_frame,
        prev = window.prev_value,
        curr = window.curr_value,
        "refining window"
    );

    let floor = window.end_frame.saturating_sub(reach).max(window.start_frame);
    let mut later = window.curr_value;
    let mut lowest_visited;
    let mut index = window.end_frame;
    loop {
        lowest_visited = index;
        if let Some(s) = sample(source, hud, weapon, index) {
            if rule.is_shot_reverse(s.value, later) {
                record(&s, s.value, later);
            }
            if s.value == window.prev_value {
                debug!(frame = index, value = s.value, "window start reconfirmed backward");
                break;
            }
            later = s.value;
        }
        if index < floor + fine {
            break;
        }
        index -= fine;
    }

    let ceiling = window
        .start_frame
        .saturating_add(reach)
        .min(lowest_visited)
        .min(source.frame_count().saturating_sub(1));
    let mut earlier = window.prev_value;
    let mut index = window.start_frame;
    while index <= ceiling {
        if let Some(s) = sample(source, hud, weapon, index) {
            if rule.is_shot_forward(earlier, s.value) {
                record(&s, earlier, s.value);
            }
            if s.value == window.curr_value {
                debug!(frame = index, value = s.value, "window end reconfirmed forward");
                break;
            }
            earlier = s.value;
        }
        index += fine;
    }

    shots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::weapons::TransitionRule;
    use crate::scan::testing::{Script, ScriptedHud, ScriptedSource};

    const FPS: f64 = 30.0;

    fn strides() -> Strides {
        Strides { coarse: 90, fine: 3 }
    }

    fn bow() -> WeaponProfile {
        WeaponProfile::new("bow", "bow", "Bow", TransitionRule::DecrementByOne)
    }

    fn r99() -> WeaponProfile {
        WeaponProfile::new("r99", "r99", "R-99", TransitionRule::RAPID_FIRE)
    }

    fn window(start_frame: u32, end_frame: u32, prev_value: u32, curr_value: u32) -> ShotWindow {
        ShotWindow {
            start_frame,
            end_frame,
            prev_value,
            curr_value,
        }
    }

    fn approx(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{actual:?} vs {expected:?}");
        }
    }

    #[test]
    fn single_decrement_found_backward() {
        // 10 until 1.7 s, 9 from 1.8 s.
        let script = Script::new().weapon_always("bow").counter(|t| if t < 1.75 { 10 } else { 9 });
        let mut source = ScriptedSource::new(FPS, 300);
        let hud = ScriptedHud::new(script);
        let shots = refine_window(&mut source, &hud, &bow(), &window(0, 90, 10, 9), &strides(), 0.3);
        approx(&shots, &[1.4]);
    }

    #[test]
    fn burst_counts_once() {
        let script = Script::new().weapon_always("r99").counter(|t| if t < 1.05 { 30 } else { 27 });
        let mut source = ScriptedSource::new(FPS, 300);
        let hud = ScriptedHud::new(script);
        let shots = refine_window(&mut source, &hud, &r99(), &window(0, 90, 30, 27), &strides(), 0.3);
        approx(&shots, &[0.7]);
    }

    #[test]
    fn drop_too_large_for_rule_is_ignored() {
        let script = Script::new().weapon_always("bow").counter(|t| if t < 1.05 { 10 } else { 8 });
        let mut source = ScriptedSource::new(FPS, 300);
        let hud = ScriptedHud::new(script);
        let shots = refine_window(&mut source, &hud, &bow(), &window(0, 90, 10, 8), &strides(), 0.3);
        assert!(shots.is_empty());
    }

    #[test]
    fn two_shots_in_one_window() {
        let script = Script::new().weapon_always("bow").counter(|t| match t {
            t if t < 0.95 => 10,
            t if t < 2.05 => 9,
            _ => 8,
        });
        let mut source = ScriptedSource::new(FPS, 300);
        let hud = ScriptedHud::new(script);
        let shots = refine_window(&mut source, &hud, &bow(), &window(0, 90, 10, 8), &strides(), 0.3);
        approx(&shots, &[1.7, 0.6]);
    }

    #[test]
    fn other_weapon_frames_do_not_break_the_chain() {
        // The bow is swapped out around the change; those samples are skipped.
        let script = Script::new()
            .weapon(|t| if (1.5..1.7).contains(&t) { Some("r99") } else { Some("bow") })
            .counter(|t| if t < 1.55 { 10 } else { 9 });
        let mut source = ScriptedSource::new(FPS, 300);
        let hud = ScriptedHud::new(script);
        let shots = refine_window(&mut source, &hud, &bow(), &window(0, 90, 10, 9), &strides(), 0.3);
        // Backward: the first bow sample below the swap is 1.4 s, reading 10.
        approx(&shots, &[1.1]);
    }

    #[test]
    fn unreadable_fine_frames_are_skipped() {
        let script = Script::new().weapon_always("bow").counter(|t| if t < 1.75 { 10 } else { 9 });
        let mut source = ScriptedSource::new(FPS, 300).failing(|i| i == 51 || i == 54);
        let hud = ScriptedHud::new(script);
        let shots = refine_window(&mut source, &hud, &bow(), &window(0, 90, 10, 9), &strides(), 0.3);
        // 1.8 s and 1.7 s cannot be read; the change is seen between 1.9 s and 1.6 s.
        approx(&shots, &[1.3]);
    }

    #[test]
    fn forward_pass_catches_what_backward_misses() {
        // The window is longer than the backward reach and the weapon is gone near its end.
        let script = Script::new()
            .weapon(|t| if t < 1.0 { Some("bow") } else { None })
            .counter(|t| if t < 0.55 { 10 } else { 9 });
        let mut source = ScriptedSource::new(FPS, 300);
        let hud = ScriptedHud::new(script);
        let shots = refine_window(&mut source, &hud, &bow(), &window(0, 180, 10, 9), &strides(), 0.3);
        approx(&shots, &[0.3]);
    }

    #[test]
    fn lead_in_clamps_at_zero() {
        let script = Script::new().weapon_always("bow").counter(|t| if t < 0.05 { 10 } else { 9 });
        let mut source = ScriptedSource::new(FPS, 300);
        let hud = ScriptedHud::new(script);
        let shots = refine_window(&mut source, &hud, &bow(), &window(0, 90, 10, 9), &strides(), 0.3);
        approx(&shots, &[0.0]);
    }

    #[test]
    fn backward_reach_is_bounded() {
        // A stale window start far in the past: only one coarse plus one fine stride is walked.
        let script = Script::new().weapon_always("bow").counter(|t| if t < 50.0 { 10 } else { 9 });
        let mut source = ScriptedSource::new(FPS, 3000);
        let hud = ScriptedHud::new(script);
        let shots = refine_window(&mut source, &hud, &bow(), &window(0, 2700, 10, 9), &strides(), 0.3);
        assert!(shots.is_empty());
        let visited = source.visited();
        assert_eq!(visited.iter().filter(|&&i| i > 100).min(), Some(&2607));
        assert_eq!(visited.iter().filter(|&&i| i <= 100).max(), Some(&93));
    }
}
