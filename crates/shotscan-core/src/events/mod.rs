//! Detected events, their deduplication and persistence.
//!
//! The scanners only call [`EventRecorder::record`]; where events end up is the
//! business of an [`EventSink`].

pub mod files;

use std::collections::HashMap;
use std::fmt;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::analysis::weapons::WeaponId;
use crate::timestamp::format_hms;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    Shot,
    ResourceWindowStart,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Shot => write!(f, "shot"),
            EventKind::ResourceWindowStart => write!(f, "resource-window-start"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub weapon: WeaponId,
    pub kind: EventKind,
    /// Seconds from the start of the video, at millisecond precision.
    pub seconds: f64,
}

impl Event {
    pub fn new(weapon: WeaponId, kind: EventKind, seconds: f64) -> Self {
        Self {
            weapon,
            kind,
            seconds: to_millis(seconds) as f64 / 1000.0,
        }
    }

    pub fn shot(weapon: &WeaponId, seconds: f64) -> Self {
        Self::new(weapon.clone(), EventKind::Shot, seconds)
    }

    pub fn resource_window_start(weapon: &WeaponId, seconds: f64) -> Self {
        Self::new(weapon.clone(), EventKind::ResourceWindowStart, seconds)
    }
}

fn to_millis(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        (seconds * 1000.0).round() as u64
    } else {
        0
    }
}

/// A persisted list of timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stream {
    /// Shots of one weapon.
    Shots(WeaponId),
    /// Resource-window starts of every weapon that has them.
    ResourceWindows,
    /// Union of the shots of all analyzed weapons.
    AllShots,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Shots(weapon) => write!(f, "shots[{weapon}]"),
            Stream::ResourceWindows => write!(f, "resource-windows"),
            Stream::AllShots => write!(f, "all-shots"),
        }
    }
}

/// Storage for timestamp streams.
pub trait EventSink {
    /// Add `seconds` to whatever is already stored for `stream`.
    fn append(&mut self, stream: &Stream, seconds: &[f64]) -> Result<()>;

    /// Everything stored for `stream`, including what earlier runs left behind.
    fn load(&mut self, stream: &Stream) -> Result<Vec<f64>>;

    /// Replace the stored content of `stream`. An empty list removes the stream.
    fn replace(&mut self, stream: &Stream, seconds: &[f64]) -> Result<()>;
}

/// Whether two times are the same event under `tolerance`. Compared in whole milliseconds.
pub fn within_tolerance(a: f64, b: f64, tolerance: f64) -> bool {
    to_millis(a).abs_diff(to_millis(b)) <= to_millis(tolerance)
}

/// Sort and drop every time within `tolerance` of the last one kept.
pub fn dedup_sorted(mut seconds: Vec<f64>, tolerance: f64) -> Vec<f64> {
    seconds.sort_by(f64::total_cmp);
    let mut kept: Vec<f64> = Vec::with_capacity(seconds.len());
    for t in seconds {
        match kept.last() {
            Some(&last) if within_tolerance(last, t, tolerance) => {}
            _ => kept.push(t),
        }
    }
    kept
}

/// Per-run totals returned by [`EventRecorder::finalize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventSummary {
    /// Final shot count of each analyzed weapon, in selection order.
    pub shots: Vec<(WeaponId, usize)>,
    pub resource_windows: usize,
    /// Every persisted event, weapon-tagged, ascending in time.
    pub timeline: Vec<Event>,
}

impl EventSummary {
    pub fn total_shots(&self) -> usize {
        self.shots.iter().map(|(_, n)| n).sum()
    }
}

/// Accepts events from the scanners, drops near-duplicates and hands the rest to a sink.
pub struct EventRecorder<S: EventSink> {
    sink: S,
    tolerance: f64,
    weapons: Vec<WeaponId>,
    /// Weapons whose resource-window starts are persisted.
    resource_weapons: Vec<WeaponId>,
    accepted: HashMap<(WeaponId, EventKind), Vec<f64>>,
    pending: Vec<Event>,
}

impl<S: EventSink> EventRecorder<S> {
    pub fn new(sink: S, weapons: Vec<WeaponId>, resource_weapons: Vec<WeaponId>, tolerance: f64) -> Self {
        Self {
            sink,
            tolerance,
            weapons,
            resource_weapons,
            accepted: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Record `event` unless one of the same weapon and kind already lies within the tolerance.
    /// Returns whether it was kept.
    pub fn record(&mut self, event: Event) -> bool {
        let seen = self
            .accepted
            .entry((event.weapon.clone(), event.kind))
            .or_default();
        if let Some(near) = seen.iter().find(|&&t| within_tolerance(t, event.seconds, self.tolerance)) {
            debug!(
                weapon = %event.weapon,
                kind = %event.kind,
                at = %format_hms(event.seconds),
                near = %format_hms(*near),
                "duplicate event dropped"
            );
            return false;
        }
        seen.push(event.seconds);
        info!(
            weapon = %event.weapon,
            kind = %event.kind,
            at = %format_hms(event.seconds),
            "event recorded"
        );
        self.pending.push(event);
        true
    }

    /// Forget accepted times that no event at or after `seconds` can fall within the tolerance of.
    /// Keeps the deduplication index bounded over long runs.
    pub fn forget_before(&mut self, seconds: f64) {
        let cutoff = to_millis(seconds).saturating_sub(to_millis(self.tolerance));
        for seen in self.accepted.values_mut() {
            seen.retain(|&t| to_millis(t) >= cutoff);
        }
    }

    /// Number of accepted times kept for deduplication.
    pub fn remembered(&self) -> usize {
        self.accepted.values().map(Vec::len).sum()
    }

    pub fn pending(&self) -> &[Event] {
        &self.pending
    }

    /// Write buffered events to the sink and clear the buffer.
    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut by_stream: HashMap<Stream, Vec<f64>> = HashMap::new();
        for event in &self.pending {
            by_stream
                .entry(self.stream_of(event))
                .or_default()
                .push(event.seconds);
        }
        for (stream, seconds) in &by_stream {
            self.sink
                .append(stream, seconds)
                .with_context(|| format!("failed to flush {stream}"))?;
            info!(%stream, count = seconds.len(), "events flushed");
        }
        self.pending.clear();
        Ok(())
    }

    /// Merge buffered events with everything already stored, deduplicate, sort and rewrite
    /// every stream. Returns the final per-weapon counts and timeline.
    pub fn finalize(&mut self) -> Result<EventSummary> {
        let mut summary = EventSummary::default();
        let mut all_shots: Vec<f64> = Vec::new();

        for weapon in self.weapons.clone() {
            let stream = Stream::Shots(weapon.clone());
            let merged = self.merge_stream(&stream, |e| e.kind == EventKind::Shot && e.weapon == weapon)?;
            info!(%weapon, shots = merged.len(), "shots finalized");
            all_shots.extend(&merged);
            summary
                .timeline
                .extend(merged.iter().map(|&t| Event::shot(&weapon, t)));
            summary.shots.push((weapon, merged.len()));
        }

        if !self.resource_weapons.is_empty() {
            let resource_weapons = self.resource_weapons.clone();
            let pending: Vec<Event> = self
                .pending
                .iter()
                .filter(|e| e.kind == EventKind::ResourceWindowStart)
                .cloned()
                .collect();
            let merged = self.merge_stream(&Stream::ResourceWindows, |e| {
                e.kind == EventKind::ResourceWindowStart && resource_weapons.contains(&e.weapon)
            })?;
            info!(count = merged.len(), "resource-window starts finalized");
            summary.resource_windows = merged.len();
            // Entries left by earlier runs carry no weapon; they go to the first resource weapon.
            for t in merged {
                let weapon = pending
                    .iter()
                    .find(|e| e.seconds == t)
                    .map_or(&resource_weapons[0], |e| &e.weapon);
                summary.timeline.push(Event::resource_window_start(weapon, t));
            }
        }

        all_shots.sort_by(f64::total_cmp);
        all_shots.dedup_by_key(|t| to_millis(*t));
        self.sink
            .replace(&Stream::AllShots, &all_shots)
            .context("failed to write the aggregate shot list")?;
        info!(count = all_shots.len(), "aggregate shot list written");

        summary
            .timeline
            .sort_by(|a, b| a.seconds.total_cmp(&b.seconds).then_with(|| a.weapon.cmp(&b.weapon)));
        self.pending.clear();
        Ok(summary)
    }

    fn merge_stream(&mut self, stream: &Stream, belongs: impl Fn(&Event) -> bool) -> Result<Vec<f64>> {
        let mut seconds = self
            .sink
            .load(stream)
            .with_context(|| format!("failed to load {stream}"))?;
        seconds.extend(self.pending.iter().filter(|e| belongs(e)).map(|e| e.seconds));
        let merged = dedup_sorted(seconds, self.tolerance);
        self.sink
            .replace(stream, &merged)
            .with_context(|| format!("failed to write {stream}"))?;
        Ok(merged)
    }

    fn stream_of(&self, event: &Event) -> Stream {
        match event.kind {
            EventKind::Shot => Stream::Shots(event.weapon.clone()),
            EventKind::ResourceWindowStart => Stream::ResourceWindows,
        }
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

/// Keeps streams in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub streams: HashMap<Stream, Vec<f64>>,
    pub appends: usize,
}

impl MemorySink {
    pub fn get(&self, stream: &Stream) -> &[f64] {
        self.streams.get(stream).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl EventSink for MemorySink {
    fn append(&mut self, stream: &Stream, seconds: &[f64]) -> Result<()> {
        self.appends += 1;
        self.streams
            .entry(stream.clone())
            .or_default()
            .extend_from_slice(seconds);
        Ok(())
    }

    fn load(&mut self, stream: &Stream) -> Result<Vec<f64>> {
        Ok(self.streams.get(stream).cloned().unwrap_or_default())
    }

    fn replace(&mut self, stream: &Stream, seconds: &[f64]) -> Result<()> {
        if seconds.is_empty() {
            self.streams.remove(stream);
        } else {
            self.streams.insert(stream.clone(), seconds.to_vec());
        }
        Ok(())
    }
}
