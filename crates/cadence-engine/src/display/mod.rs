//! Display timing.
//!
//! Tracks the default display's vsync period and the release offset derived
//! from it. Values are recomputed only when the platform pushes a display
//! change; nothing here polls.

mod timing;

pub mod platform;

pub use timing::{
    DisplayTimingConfig,
    DisplayTimingProvider,
    FixedRefreshRate,
    RefreshRateSource,
    VsyncTiming,
};
