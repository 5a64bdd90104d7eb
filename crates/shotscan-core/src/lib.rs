pub mod analysis;
pub mod config;
pub mod debug;
pub mod events;
pub mod pipeline;
pub mod rect;
pub mod scan;
pub mod timestamp;
pub mod video;

#[cfg(test)]
mod testutil;
