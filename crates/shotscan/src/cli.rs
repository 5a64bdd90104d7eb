use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "shotscan", about = "Finds shot timestamps in gameplay recordings from the HUD ammo counter")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Analyze a recorded video file.
    Analyze {
        /// Path to the input video file (MP4, etc.).
        #[arg(short, long)]
        input: PathBuf,

        /// Directory holding the digit banks and icon templates.
        #[arg(short, long)]
        templates: PathBuf,

        /// Directory to write the timestamp files to.
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        overrides: ConfigArgs,

        /// Directory to save frames that produced an event, with HUD region overlays.
        #[arg(long)]
        debug_frames: Option<PathBuf>,

        /// Font used for the text on debug frames.
        #[arg(long, requires = "debug_frames")]
        debug_font: Option<PathBuf>,
    },

    /// List the built-in weapons.
    Weapons,

    /// Print the effective configuration as JSON.
    PrintConfig {
        #[command(flatten)]
        overrides: ConfigArgs,
    },
}

/// Configuration file plus the fields that can be overridden from the command line.
#[derive(Args)]
pub struct ConfigArgs {
    /// JSON configuration file. Missing fields take their defaults.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Weapons to analyze, by id (see `shotscan weapons`).
    #[arg(short, long, value_delimiter = ',')]
    pub weapons: Option<Vec<String>>,

    /// Where to start scanning, HH:MM:SS.mmm.
    #[arg(long)]
    pub start: Option<String>,

    /// Seconds between coarse samples.
    #[arg(long)]
    pub coarse: Option<f64>,

    /// Seconds between fine samples.
    #[arg(long)]
    pub fine: Option<f64>,
}
