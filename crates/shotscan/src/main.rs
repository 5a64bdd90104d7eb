mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use shotscan_core::analysis::weapons::{WeaponId, WeaponRegistry};
use shotscan_core::config::ScanConfig;
use shotscan_core::events::EventKind;
use shotscan_core::pipeline::{self, PipelineOptions, PipelineReport};
use shotscan_core::timestamp::format_hms;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();
    let registry = WeaponRegistry::builtin();

    match cli.command {
        cli::Command::Analyze {
            input,
            templates,
            output,
            overrides,
            debug_frames,
            debug_font,
        } => {
            let config = effective_config(&overrides)?;
            info!(?input, ?output, weapons = ?config.weapons, start = %config.start, "starting analysis");

            let options = PipelineOptions {
                input,
                templates_dir: templates,
                output_dir: output,
                debug_frames_dir: debug_frames,
                debug_font,
            };
            let report = pipeline::run_pipeline(&options, &config, &registry).context("pipeline failed")?;
            log_summary(&report);
            Ok(())
        }
        cli::Command::Weapons => {
            for profile in registry.iter() {
                println!(
                    "{:<14} {:<18} {:<36} {}",
                    profile.id.as_str(),
                    profile.display_name,
                    profile.rule.to_string(),
                    if profile.has_unlimited_icon { "unlimited-icon" } else { "" }
                );
            }
            Ok(())
        }
        cli::Command::PrintConfig { overrides } => {
            let config = effective_config(&overrides)?;
            println!("{}", config.to_json()?);
            Ok(())
        }
    }
}

/// The configuration file, or the defaults, with command-line overrides applied.
fn effective_config(args: &cli::ConfigArgs) -> Result<ScanConfig> {
    let mut config = match &args.config {
        Some(path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };
    if let Some(weapons) = &args.weapons {
        config.weapons = weapons.iter().map(|w| WeaponId::from(w.trim())).collect();
    }
    if let Some(start) = &args.start {
        config.start = start.clone();
    }
    if let Some(coarse) = args.coarse {
        config.coarse_interval_secs = coarse;
    }
    if let Some(fine) = args.fine {
        config.fine_interval_secs = fine;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn log_summary(report: &PipelineReport) {
    if report.stats.ended_early {
        warn!("video could not be read to the end, results cover the part scanned");
    }
    for (weapon, shots) in &report.events.shots {
        info!(%weapon, shots, "weapon summary");
    }
    for event in &report.events.timeline {
        match event.kind {
            EventKind::Shot => info!(weapon = %event.weapon, at = %format_hms(event.seconds), "shot"),
            EventKind::ResourceWindowStart => {
                info!(weapon = %event.weapon, at = %format_hms(event.seconds), "unlimited window start")
            }
        }
    }
    info!(
        coarse_samples = report.stats.coarse_samples,
        windows_refined = report.stats.windows_refined,
        total_shots = report.events.total_shots(),
        resource_windows = report.events.resource_windows,
        "analysis complete"
    );
}
