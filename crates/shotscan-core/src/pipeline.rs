use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::analysis::templates::TemplateLibrary;
use crate::analysis::weapons::{WeaponProfile, WeaponRegistry};
use crate::analysis::{Hud, TemplateHud};
use crate::config::ScanConfig;
use crate::debug::DebugRenderer;
use crate::events::files::TimestampFiles;
use crate::events::{EventRecorder, EventSink, EventSummary};
use crate::scan::coarse::{CoarseScanner, ScanObserver, ScanStats};
use crate::scan::ScanSettings;
use crate::video::decoder::VideoDecoder;
use crate::video::FrameSource;

/// Where a run reads from and writes to.
pub struct PipelineOptions {
    pub input: PathBuf,
    /// Holds `left/`, `right/`, the weapon icons and the unlimited icon.
    pub templates_dir: PathBuf,
    /// Receives the timestamp files.
    pub output_dir: PathBuf,
    /// Directory to write debug frames to, or None to skip.
    pub debug_frames_dir: Option<PathBuf>,
    pub debug_font: Option<PathBuf>,
}

#[derive(Debug)]
pub struct PipelineReport {
    pub stats: ScanStats,
    pub events: EventSummary,
}

/// Scan one video and write its timestamp files.
///
/// Fails on an invalid configuration, a missing or unopenable video, and when none
/// of the selected weapons has an icon template.
pub fn run_pipeline(
    options: &PipelineOptions,
    config: &ScanConfig,
    registry: &WeaponRegistry,
) -> Result<PipelineReport> {
    let input = options.input.as_path();
    if !input.exists() {
        bail!("input video does not exist: {}", input.display());
    }
    config.validate().context("invalid configuration")?;

    info!(
        ?input,
        templates = ?options.templates_dir,
        output = ?options.output_dir,
        start = %config.start,
        weapons = ?config.weapons,
        "pipeline starting"
    );

    let templates = TemplateLibrary::load(&options.templates_dir, registry, &config.unlimited_icon_file);
    let weapons = analyzable_weapons(config, registry, &templates)?;

    let mut decoder = VideoDecoder::open(input).context("failed to open video")?;
    let hud = TemplateHud::new(decoder.width(), decoder.height(), config, templates);
    let sink = TimestampFiles::new(&options.output_dir)?;

    let mut renderer = options
        .debug_frames_dir
        .as_deref()
        .map(|dir| DebugRenderer::new(dir, options.debug_font.as_deref()))
        .transpose()?;
    let observer = renderer.as_mut().map(|r| r as &mut dyn ScanObserver);

    let report = scan_video(&mut decoder, &hud, &weapons, config, sink, observer)?;
    if let Some(renderer) = &renderer {
        info!(saved = renderer.saved(), "debug frames written");
    }
    info!(
        total_shots = report.events.total_shots(),
        resource_windows = report.events.resource_windows,
        "pipeline complete"
    );
    Ok(report)
}

/// Selected weapons that are known and have an icon template, in selection order.
fn analyzable_weapons<'r>(
    config: &ScanConfig,
    registry: &'r WeaponRegistry,
    templates: &TemplateLibrary,
) -> Result<Vec<&'r WeaponProfile>> {
    let mut weapons = Vec::new();
    for id in config.selected_weapons(registry) {
        let Some(profile) = registry.get(&id) else {
            continue;
        };
        if !templates.icons.contains(&id) {
            warn!(weapon = %id, file = %profile.icon_file_name(), "no icon template, weapon skipped");
            continue;
        }
        weapons.push(profile);
    }
    if weapons.is_empty() {
        bail!("none of the selected weapons has an icon template, nothing to analyze");
    }
    info!(
        weapons = ?weapons.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
        "weapons to analyze"
    );
    Ok(weapons)
}

/// Run the coarse scan over `source` and persist the events into `sink`.
pub fn scan_video<S, K>(
    source: &mut S,
    hud: &dyn Hud,
    weapons: &[&WeaponProfile],
    config: &ScanConfig,
    sink: K,
    observer: Option<&mut dyn ScanObserver>,
) -> Result<PipelineReport>
where
    S: FrameSource + ?Sized,
    K: EventSink,
{
    let settings = ScanSettings::for_source(config, source)?;
    let ids = weapons.iter().map(|p| p.id.clone()).collect();
    let resource_ids = weapons
        .iter()
        .filter(|p| p.has_unlimited_icon)
        .map(|p| p.id.clone())
        .collect();
    let mut recorder = EventRecorder::new(sink, ids, resource_ids, config.dedup_tolerance_secs);

    let mut scanner = CoarseScanner::new(hud, weapons.to_vec(), settings);
    let stats = scanner.run(source, &mut recorder, observer)?;
    let events = recorder.finalize().context("failed to finalize timestamp files")?;
    Ok(PipelineReport { stats, events })
}
