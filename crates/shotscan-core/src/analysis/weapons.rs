use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::region::BinaryImage;
use super::score::iou_score;
use super::templates::IconBank;

/// Stable identifier of a weapon, e.g. `"bow"`. Used in config and output file names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeaponId(String);

impl WeaponId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WeaponId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WeaponId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// How a weapon's on-screen counter goes down per use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRule {
    /// Exactly one unit per shot.
    DecrementByOne,
    /// One to `max_units` units may disappear between two fine samples.
    SmallBurst { max_units: u32 },
}

impl TransitionRule {
    pub const RAPID_FIRE: TransitionRule = TransitionRule::SmallBurst { max_units: 3 };

    /// Scanning backward in time: `earlier` was read at the current sample,
    /// `later` at the sample visited just before it.
    pub fn is_shot_reverse(&self, earlier: u32, later: u32) -> bool {
        self.is_drop(earlier, later)
    }

    /// Scanning forward in time: `earlier` is the running previous reading,
    /// `later` was read at the current sample.
    pub fn is_shot_forward(&self, earlier: u32, later: u32) -> bool {
        self.is_drop(earlier, later)
    }

    fn is_drop(&self, earlier: u32, later: u32) -> bool {
        let Some(drop) = earlier.checked_sub(later) else {
            return false;
        };
        match *self {
            TransitionRule::DecrementByOne => drop == 1,
            TransitionRule::SmallBurst { max_units } => drop > 0 && drop <= max_units,
        }
    }
}

impl fmt::Display for TransitionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionRule::DecrementByOne => write!(f, "decrement-by-one"),
            TransitionRule::SmallBurst { max_units } => {
                write!(f, "decrement-by-small-burst[1..{max_units}]")
            }
        }
    }
}

/// Immutable description of one weapon.
#[derive(Debug, Clone, PartialEq)]
pub struct WeaponProfile {
    pub id: WeaponId,
    pub display_name: String,
    /// Icon template file is `template_<icon_suffix>.png`.
    pub icon_suffix: String,
    pub rule: TransitionRule,
    /// Whether the counter can be replaced by the unlimited-resource icon.
    pub has_unlimited_icon: bool,
}

impl WeaponProfile {
    pub fn new(id: &str, icon_suffix: &str, display_name: &str, rule: TransitionRule) -> Self {
        Self {
            id: WeaponId::new(id),
            display_name: display_name.to_string(),
            icon_suffix: icon_suffix.to_string(),
            rule,
            has_unlimited_icon: false,
        }
    }

    pub fn with_unlimited_icon(mut self) -> Self {
        self.has_unlimited_icon = true;
        self
    }

    pub fn icon_file_name(&self) -> String {
        format!("template_{}.png", self.icon_suffix)
    }
}

/// The set of weapons known to a run. Passed explicitly into the scanner.
#[derive(Debug, Clone)]
pub struct WeaponRegistry {
    profiles: Vec<WeaponProfile>,
}

impl WeaponRegistry {
    pub fn new(profiles: Vec<WeaponProfile>) -> Self {
        Self { profiles }
    }

    /// The weapons the template pack ships icons for.
    pub fn builtin() -> Self {
        use TransitionRule::DecrementByOne as One;
        const BURST: TransitionRule = TransitionRule::RAPID_FIRE;

        Self::new(vec![
            WeaponProfile::new("bow", "bow", "Bocek Bow", One).with_unlimited_icon(),
            WeaponProfile::new("kraber", "kraber", "Kraber", One),
            WeaponProfile::new("charge_rifle", "charge", "Charge Rifle", One),
            WeaponProfile::new("sentinel", "sentinel", "Sentinel", One),
            WeaponProfile::new("peacekeeper", "pkred", "Peacekeeper (Red)", One),
            WeaponProfile::new("mastiff", "mastiff", "Mastiff", One),
            WeaponProfile::new("tripletake", "triple", "Triple Take", One),
            WeaponProfile::new("longbow", "longbow", "Longbow DMR", One),
            WeaponProfile::new("eva8", "eva", "EVA-8 Auto", BURST),
            WeaponProfile::new("mozambique_double", "mozambiquedouble", "Mozambique (Double)", BURST),
            WeaponProfile::new("r3030", "3030", "30-30 Repeater", BURST),
            WeaponProfile::new("wingman", "wingman", "Wingman", BURST),
            WeaponProfile::new("g7", "g7", "G7 Scout", BURST),
            WeaponProfile::new("rampage", "rampage", "Rampage LMG", BURST),
            WeaponProfile::new("p2020_double", "p2020double", "P2020 (Double)", BURST),
            WeaponProfile::new("hemlok", "hemlok", "Hemlok", BURST),
            WeaponProfile::new("spitfire", "spitfire", "Spitfire", BURST),
            WeaponProfile::new("nemesis", "nemesis", "Nemesis", BURST),
            WeaponProfile::new("flatline", "flatline", "Flatline", BURST),
            WeaponProfile::new("havoc", "havoc", "Havoc", BURST),
            WeaponProfile::new("re45", "re45", "RE-45 Auto", BURST),
            WeaponProfile::new("r301", "r301", "R-301 Carbine", BURST),
            WeaponProfile::new("devotion", "devotion", "Devotion LMG", BURST),
            WeaponProfile::new("car", "car", "C.A.R. SMG", BURST),
            WeaponProfile::new("r99", "r99", "R-99 SMG", BURST),
        ])
    }

    pub fn get(&self, id: &WeaponId) -> Option<&WeaponProfile> {
        self.profiles.iter().find(|p| &p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WeaponProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

/// The icon in `icons` that best matches `region`, if that best score clears `threshold`.
///
/// Only the overall best match is considered: a runner-up above the threshold
/// never stands in for a best match below it. Ties go to the earlier icon.
pub fn classify_weapon(region: &BinaryImage, icons: &IconBank, threshold: f64) -> Option<WeaponId> {
    let mut best: Option<(&WeaponId, f64)> = None;
    for icon in icons.iter() {
        let score = iou_score(region, &icon.image);
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((&icon.label, score));
        }
    }

    let (weapon, score) = best?;
    debug!(%weapon, score, threshold, "best weapon icon");
    (score > threshold).then(|| weapon.clone())
}

/// Whether `region` matches a single icon above `threshold`.
pub fn matches_icon(region: &BinaryImage, icon: &BinaryImage, threshold: f64) -> bool {
    iou_score(region, icon) > threshold
}
