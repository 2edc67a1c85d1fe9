//! Cadence engine crate.
//!
//! Smooths video frame release times and aligns them with the display's
//! vsync so frames reach the display at a steady cadence.
//!
//! Typical wiring:
//! - one `VsyncClockSource` and one `DisplayTimingProvider` per process
//! - one `ReleaseTimeSmoother` per playback session, sharing both

pub mod display;
pub mod logging;
pub mod release;
pub mod time;
pub mod vsync;

mod error;

pub use error::PacerError;
