//! Vsync sampling.
//!
//! A single `VsyncClockSource` is shared by every playback session. It owns a
//! timing thread that samples the display's vsync signal every
//! `SamplerConfig::sample_delay` while at least one session observes it.

mod signal;
mod source;

pub use signal::{SyntheticVsync, VsyncSignal};
pub use source::{SamplerConfig, VsyncClockSource, VsyncSampler};
