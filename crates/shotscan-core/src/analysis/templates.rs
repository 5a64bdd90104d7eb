//! Reference templates read from the template directory.
//!
//! Layout:
//! ```text
//! <root>/left/<digit>*.png      digit bank for the left counter slot
//! <root>/right/<digit>*.png     digit bank for the right counter slot
//! <root>/template_<suffix>.png  one icon per weapon
//! <root>/template_infinite.png  unlimited-resource icon (name configurable)
//! ```
//! Everything is binarized once at load time and read-only afterwards.
//! Missing pieces are logged and left out; they never abort the run.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use super::region::{BinaryImage, TEMPLATE_LEVEL};
use super::weapons::{WeaponId, WeaponRegistry};

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template {path} could not be read: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("template directory {path} could not be listed: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which half of the two-digit counter a digit bank belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitSlot {
    Left,
    Right,
}

impl DigitSlot {
    pub fn dir_name(self) -> &'static str {
        match self {
            DigitSlot::Left => "left",
            DigitSlot::Right => "right",
        }
    }
}

/// A binarized reference image with the label it stands for.
#[derive(Debug, Clone)]
pub struct Template<L> {
    pub label: L,
    pub image: BinaryImage,
}

/// Read an image file and binarize it with the fixed template cutoff.
pub fn load_template(path: &Path) -> Result<BinaryImage, TemplateError> {
    let img = image::open(path).map_err(|source| TemplateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BinaryImage::from_gray_fixed(&img.to_luma8(), TEMPLATE_LEVEL))
}

/// Left and right digit banks.
#[derive(Debug, Clone, Default)]
pub struct DigitBanks {
    left: Vec<Template<u8>>,
    right: Vec<Template<u8>>,
}

impl DigitBanks {
    pub fn new(left: Vec<Template<u8>>, right: Vec<Template<u8>>) -> Self {
        Self { left, right }
    }

    pub fn load(root: &Path) -> Self {
        let mut banks = Self::default();
        for slot in [DigitSlot::Left, DigitSlot::Right] {
            let dir = root.join(slot.dir_name());
            let bank = match load_digit_bank(&dir) {
                Ok(bank) => bank,
                Err(e) => {
                    warn!(error = %e, ?slot, "digit bank unavailable, this slot never reads");
                    Vec::new()
                }
            };
            info!(?slot, ?dir, templates = bank.len(), "digit bank loaded");
            match slot {
                DigitSlot::Left => banks.left = bank,
                DigitSlot::Right => banks.right = bank,
            }
        }
        banks
    }

    pub fn bank(&self, slot: DigitSlot) -> &[Template<u8>] {
        match slot {
            DigitSlot::Left => &self.left,
            DigitSlot::Right => &self.right,
        }
    }
}

/// Load every `.png` in `dir`, in file-name order. The leading character of the
/// file name is the digit label; files without one are skipped.
fn load_digit_bank(dir: &Path) -> Result<Vec<Template<u8>>, TemplateError> {
    let list_err = |source| TemplateError::ListDir {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(list_err)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    paths.sort();

    let mut bank = Vec::with_capacity(paths.len());
    for path in paths {
        let label = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.chars().next())
            .and_then(|c| c.to_digit(10));
        let Some(label) = label else {
            warn!(?path, "digit template name does not start with a digit, skipping");
            continue;
        };
        match load_template(&path) {
            Ok(image) => bank.push(Template {
                label: label as u8,
                image,
            }),
            Err(e) => warn!(error = %e, "skipping unreadable digit template"),
        }
    }
    Ok(bank)
}

/// Weapon icons, in registry order. Weapons whose icon is missing are absent.
#[derive(Debug, Clone, Default)]
pub struct IconBank {
    icons: Vec<Template<WeaponId>>,
}

impl IconBank {
    pub fn new(icons: Vec<Template<WeaponId>>) -> Self {
        Self { icons }
    }

    pub fn load(root: &Path, registry: &WeaponRegistry) -> Self {
        let mut icons = Vec::new();
        for profile in registry.iter() {
            let path = root.join(profile.icon_file_name());
            if !path.exists() {
                warn!(
                    weapon = %profile.id,
                    display_name = %profile.display_name,
                    ?path,
                    "weapon icon template missing, weapon cannot be detected this run"
                );
                continue;
            }
            match load_template(&path) {
                Ok(image) => icons.push(Template {
                    label: profile.id.clone(),
                    image,
                }),
                Err(e) => warn!(weapon = %profile.id, error = %e, "weapon icon unreadable, excluded"),
            }
        }
        info!(icons = icons.len(), known = registry.len(), "weapon icon bank loaded");
        Self { icons }
    }

    pub fn get(&self, weapon: &WeaponId) -> Option<&BinaryImage> {
        self.icons
            .iter()
            .find(|t| &t.label == weapon)
            .map(|t| &t.image)
    }

    pub fn contains(&self, weapon: &WeaponId) -> bool {
        self.get(weapon).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template<WeaponId>> {
        self.icons.iter()
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }
}

/// All templates a run matches against.
#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    pub digits: DigitBanks,
    pub icons: IconBank,
    pub unlimited_icon: Option<BinaryImage>,
}

impl TemplateLibrary {
    pub fn load(root: &Path, registry: &WeaponRegistry, unlimited_icon_file: &str) -> Self {
        info!(?root, "loading templates");
        let digits = DigitBanks::load(root);
        let icons = IconBank::load(root, registry);

        let unlimited_path = root.join(unlimited_icon_file);
        let unlimited_icon = if unlimited_path.exists() {
            match load_template(&unlimited_path) {
                Ok(image) => Some(image),
                Err(e) => {
                    warn!(error = %e, "unlimited icon template unreadable");
                    None
                }
            }
        } else {
            warn!(path = ?unlimited_path, "unlimited icon template missing");
            None
        };

        Self {
            digits,
            icons,
            unlimited_icon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    use crate::analysis::weapons::{TransitionRule, WeaponProfile};
    use crate::testutil::{digit_glyph, glyph_png, icon_glyph, scratch_dir};

    fn write_digit_bank(root: &Path, slot: DigitSlot) {
        let dir = root.join(slot.dir_name());
        std::fs::create_dir_all(&dir).unwrap();
        for d in 0..10u8 {
            glyph_png(24, 8, digit_glyph(d))
                .save(dir.join(format!("{d}_{}.png", slot.dir_name())))
                .unwrap();
        }
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
        glyph_png(24, 8, |_, _| true).save(dir.join("x.png")).unwrap();
    }

    #[test]
    #[traced_test]
    fn digit_banks_load_sorted_and_labeled() {
        let root = scratch_dir("digit-banks");
        write_digit_bank(&root, DigitSlot::Left);
        write_digit_bank(&root, DigitSlot::Right);

        let banks = DigitBanks::load(&root);
        for slot in [DigitSlot::Left, DigitSlot::Right] {
            let labels: Vec<u8> = banks.bank(slot).iter().map(|t| t.label).collect();
            assert_eq!(labels, (0..10).collect::<Vec<u8>>());
        }
        assert!(logs_contain("does not start with a digit"));
    }

    #[test]
    #[traced_test]
    fn missing_digit_dir_gives_empty_bank() {
        let root = scratch_dir("digit-missing");
        write_digit_bank(&root, DigitSlot::Left);

        let banks = DigitBanks::load(&root);
        assert_eq!(banks.bank(DigitSlot::Left).len(), 10);
        assert!(banks.bank(DigitSlot::Right).is_empty());
    }

    #[test]
    #[traced_test]
    fn icon_bank_skips_missing_weapons() {
        let root = scratch_dir("icon-bank");
        let registry = WeaponRegistry::new(vec![
            WeaponProfile::new("bow", "bow", "Bow", TransitionRule::DecrementByOne),
            WeaponProfile::new("r99", "r99", "R-99", TransitionRule::RAPID_FIRE),
        ]);
        glyph_png(16, 8, icon_glyph(0))
            .save(root.join("template_bow.png"))
            .unwrap();

        let bank = IconBank::load(&root, &registry);
        assert_eq!(bank.len(), 1);
        assert!(bank.contains(&"bow".into()));
        assert!(!bank.contains(&"r99".into()));
        assert!(logs_contain("weapon icon template missing"));
    }

    #[test]
    fn template_binarization_uses_fixed_level() {
        let root = scratch_dir("template-level");
        let path = root.join("t.png");
        glyph_png(4, 1, |x, _| x >= 2).save(&path).unwrap();
        let t = load_template(&path).unwrap();
        assert_eq!(t.foreground().collect::<Vec<_>>(), vec![false, false, true, true]);
    }

    #[test]
    fn unreadable_template_is_an_error() {
        let root = scratch_dir("template-bad");
        let path = root.join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();
        assert!(matches!(load_template(&path), Err(TemplateError::Read { .. })));
    }

    #[test]
    #[traced_test]
    fn library_without_unlimited_icon() {
        let root = scratch_dir("library");
        let lib = TemplateLibrary::load(&root, &WeaponRegistry::builtin(), "template_infinite.png");
        assert!(lib.unlimited_icon.is_none());
        assert!(lib.icons.is_empty());
        assert!(lib.digits.bank(DigitSlot::Left).is_empty());
    }
}
