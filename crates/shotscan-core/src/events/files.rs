//! Timestamp streams stored as text files, one `HH:MM:SS.mmm` per line.
//!
//! ```text
//! <dir>/shooting_<weapon>.txt   shots of one weapon
//! <dir>/infinite.txt            resource-window starts
//! <dir>/all_weapons.txt         union of all shots
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::{EventSink, Stream};
use crate::timestamp::{format_hms, parse_hms};

pub struct TimestampFiles {
    dir: PathBuf,
}

impl TimestampFiles {
    pub fn new(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        info!(?dir, "output directory ready");
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn path_of(&self, stream: &Stream) -> PathBuf {
        let name = match stream {
            Stream::Shots(weapon) => format!("shooting_{weapon}.txt"),
            Stream::ResourceWindows => "infinite.txt".to_string(),
            Stream::AllShots => "all_weapons.txt".to_string(),
        };
        self.dir.join(name)
    }
}

fn render(seconds: &[f64]) -> String {
    let mut text = String::with_capacity(seconds.len() * 13);
    for &t in seconds {
        text.push_str(&format_hms(t));
        text.push('\n');
    }
    text
}

impl EventSink for TimestampFiles {
    fn append(&mut self, stream: &Stream, seconds: &[f64]) -> Result<()> {
        let path = self.path_of(stream);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        file.write_all(render(seconds).as_bytes())
            .with_context(|| format!("failed to append to {}", path.display()))?;
        debug!(?path, count = seconds.len(), "timestamps appended");
        Ok(())
    }

    fn load(&mut self, stream: &Stream) -> Result<Vec<f64>> {
        let path = self.path_of(stream);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut seconds = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_hms(line) {
                Ok(t) => seconds.push(t),
                Err(e) => warn!(?path, line = line_no + 1, error = %e, "skipping malformed timestamp"),
            }
        }
        Ok(seconds)
    }

    fn replace(&mut self, stream: &Stream, seconds: &[f64]) -> Result<()> {
        let path = self.path_of(stream);
        if seconds.is_empty() {
            if path.exists() {
                fs::remove_file(&path)
                    .with_context(|| format!("failed to remove empty {}", path.display()))?;
                info!(?path, "removed empty output file");
            }
            return Ok(());
        }
        fs::write(&path, render(seconds))
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(?path, count = seconds.len(), "output file written");
        Ok(())
    }
}
