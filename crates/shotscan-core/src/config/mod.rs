//! Run configuration.
//!
//! Stored as JSON. Every field is optional in the file; missing ones take the
//! reference-layout defaults.

pub mod regions;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::analysis::digits::DIGIT_FLOOR;
use crate::analysis::weapons::{WeaponId, WeaponRegistry};
use crate::rect::{CounterRoi, Roi};
use crate::timestamp::{parse_hms, TimestampError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a positive number of seconds, got {value}")]
    Interval { name: &'static str, value: f64 },
    #[error("{name} must lie in [0, 1], got {value}")]
    Threshold { name: &'static str, value: f64 },
    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("flush_every must be at least 1")]
    FlushEvery,
    #[error("no weapons selected")]
    NoWeapons,
    #[error("invalid start offset: {0}")]
    Start(#[from] TimestampError),
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything one scan needs besides the video and template paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Two-digit counter region and the x coordinate between its digits.
    pub counter_roi: CounterRoi,
    /// Region holding the icon of the weapon in hand.
    pub weapon_roi: Roi,
    /// Region where the unlimited-resource icon appears.
    pub unlimited_roi: Roi,

    /// A weapon icon must score above this to count as active.
    pub weapon_threshold: f64,
    pub unlimited_threshold: f64,
    pub digit_floor: f64,

    /// Seconds between coarse samples.
    pub coarse_interval_secs: f64,
    /// Seconds between fine samples inside a transition window.
    pub fine_interval_secs: f64,
    /// Where the coarse scan starts, `HH:MM:SS.mmm`.
    pub start: String,

    /// Subtracted from every refined shot time to undo the HUD update lag.
    pub lead_in_secs: f64,
    /// Two events of one weapon closer than this are the same event.
    pub dedup_tolerance_secs: f64,
    /// Buffered events are flushed to disk every this many coarse samples.
    pub flush_every: u32,

    /// Weapons to analyze, by id.
    pub weapons: Vec<WeaponId>,
    /// File name of the unlimited-resource icon inside the template directory.
    pub unlimited_icon_file: String,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            counter_roi: regions::COUNTER,
            weapon_roi: regions::WEAPON,
            unlimited_roi: regions::UNLIMITED,
            weapon_threshold: 0.75,
            unlimited_threshold: 0.74,
            digit_floor: DIGIT_FLOOR,
            coarse_interval_secs: 3.0,
            fine_interval_secs: 0.1,
            start: "00:00:00.000".to_string(),
            lead_in_secs: 0.3,
            dedup_tolerance_secs: 0.2,
            flush_every: 20,
            weapons: vec![WeaponId::from("bow")],
            unlimited_icon_file: "template_infinite.png".to_string(),
        }
    }
}

impl ScanConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(?path, "configuration loaded");
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = self.to_json()?;
        fs::write(path, json).map_err(write_err)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Reject values no scan can run with. Region geometry is checked later
    /// against the actual frame size, where a bad region is not fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("coarse_interval_secs", self.coarse_interval_secs),
            ("fine_interval_secs", self.fine_interval_secs),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Interval { name, value });
            }
        }
        for (name, value) in [
            ("weapon_threshold", self.weapon_threshold),
            ("unlimited_threshold", self.unlimited_threshold),
            ("digit_floor", self.digit_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Threshold { name, value });
            }
        }
        for (name, value) in [
            ("lead_in_secs", self.lead_in_secs),
            ("dedup_tolerance_secs", self.dedup_tolerance_secs),
        ] {
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::Negative { name, value });
            }
        }
        if self.flush_every == 0 {
            return Err(ConfigError::FlushEvery);
        }
        if self.weapons.is_empty() {
            return Err(ConfigError::NoWeapons);
        }
        parse_hms(&self.start)?;
        Ok(())
    }

    /// Start offset in seconds.
    pub fn start_seconds(&self) -> Result<f64, ConfigError> {
        Ok(parse_hms(&self.start)?)
    }

    /// The selected weapons that `registry` knows, in selection order, without repeats.
    /// Unknown ids are logged and dropped.
    pub fn selected_weapons(&self, registry: &WeaponRegistry) -> Vec<WeaponId> {
        let mut selected: Vec<WeaponId> = Vec::with_capacity(self.weapons.len());
        for id in &self.weapons {
            if registry.get(id).is_none() {
                warn!(weapon = %id, "unknown weapon id in selection, ignoring");
                continue;
            }
            if !selected.contains(id) {
                selected.push(id.clone());
            }
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    use crate::testutil::scratch_dir;

    #[test]
    fn defaults_are_valid() {
        let config = ScanConfig::default();
        config.validate().unwrap();
        assert_eq!(config.counter_roi.split_x, 1754);
        assert_eq!(config.weapons, vec![WeaponId::from("bow")]);
        assert_eq!(config.start_seconds().unwrap(), 0.0);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ScanConfig =
            serde_json::from_str(r#"{ "coarse_interval_secs": 2.5, "weapons": ["r99", "bow"] }"#)
                .unwrap();
        assert_eq!(config.coarse_interval_secs, 2.5);
        assert_eq!(config.weapons.len(), 2);
        assert_eq!(config.fine_interval_secs, 0.1);
        assert_eq!(config.weapon_roi, regions::WEAPON);
    }

    #[test]
    fn roi_json_shape() {
        let config: ScanConfig = serde_json::from_str(
            r#"{ "counter_roi": { "roi": { "x1": 0, "y1": 0, "x2": 48, "y2": 8 }, "split_x": 24 } }"#,
        )
        .unwrap();
        assert_eq!(config.counter_roi.left(), Roi::new(0, 0, 24, 8));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let cases: Vec<(fn(&mut ScanConfig), &str)> = vec![
            (|c: &mut ScanConfig| c.coarse_interval_secs = 0.0, "coarse_interval_secs"),
            (|c: &mut ScanConfig| c.fine_interval_secs = -0.1, "fine_interval_secs"),
            (|c: &mut ScanConfig| c.fine_interval_secs = f64::NAN, "fine_interval_secs"),
            (|c: &mut ScanConfig| c.weapon_threshold = 1.5, "weapon_threshold"),
            (|c: &mut ScanConfig| c.digit_floor = -0.1, "digit_floor"),
            (|c: &mut ScanConfig| c.dedup_tolerance_secs = -1.0, "dedup_tolerance_secs"),
            (|c: &mut ScanConfig| c.flush_every = 0, "flush_every"),
            (|c: &mut ScanConfig| c.weapons.clear(), "no weapons"),
            (|c: &mut ScanConfig| c.start = "1:2".into(), "start offset"),
        ];
        for (mutate, needle) in cases {
            let mut config = ScanConfig::default();
            mutate(&mut config);
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains(needle), "{err} should mention {needle}");
        }
    }

    #[test]
    fn save_then_load() {
        let dir = scratch_dir("config-io");
        let path = dir.join("nested").join("scan.json");
        let mut config = ScanConfig::default();
        config.weapons = vec!["kraber".into(), "r99".into()];
        config.lead_in_secs = 0.5;
        config.save(&path).unwrap();
        assert_eq!(ScanConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = scratch_dir("config-bad");
        assert!(matches!(
            ScanConfig::load(&dir.join("absent.json")),
            Err(ConfigError::Read { .. })
        ));
        let bad = dir.join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        assert!(matches!(ScanConfig::load(&bad), Err(ConfigError::Parse { .. })));
    }

    #[test]
    #[traced_test]
    fn selection_drops_unknown_and_repeated_ids() {
        let mut config = ScanConfig::default();
        config.weapons = vec!["bow".into(), "laser".into(), "r99".into(), "bow".into()];
        let selected = config.selected_weapons(&WeaponRegistry::builtin());
        assert_eq!(selected, vec![WeaponId::from("bow"), WeaponId::from("r99")]);
        assert!(logs_contain("unknown weapon id"));
    }
}
