pub mod coarse;
pub mod fine;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

use tracing::info;

use crate::config::{ConfigError, ScanConfig};
use crate::video::FrameSource;

/// Sampling strides in frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strides {
    pub coarse: u32,
    pub fine: u32,
}

/// Frame-based scan parameters for one video.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSettings {
    pub strides: Strides,
    pub start_frame: u32,
    pub lead_in_secs: f64,
    pub flush_every: u32,
}

impl ScanSettings {
    pub fn for_source<S: FrameSource + ?Sized>(config: &ScanConfig, source: &S) -> Result<Self, ConfigError> {
        let strides = Strides {
            coarse: source.stride_for(config.coarse_interval_secs),
            fine: source.stride_for(config.fine_interval_secs),
        };
        let start_frame = (config.start_seconds()? * source.fps()) as u32;
        info!(
            coarse_stride = strides.coarse,
            fine_stride = strides.fine,
            start_frame,
            fps = source.fps(),
            "scan strides chosen"
        );
        Ok(Self {
            strides,
            start_frame,
            lead_in_secs: config.lead_in_secs,
            flush_every: config.flush_every.max(1),
        })
    }
}
