use std::sync::atomic::{AtomicU32, Ordering};

use winit::event_loop::ActiveEventLoop;
use winit::monitor::MonitorHandle;

use crate::display::RefreshRateSource;
use crate::error::PacerError;

/// Refresh-rate source fed from the winit event loop.
///
/// winit monitor handles are only queried on the event loop thread, so the
/// runtime pushes readings here and the provider reads the cached value.
/// Zero means the primary monitor did not report a rate.
#[derive(Debug, Default)]
pub struct WinitRefreshRate {
    millihertz: AtomicU32,
}

impl WinitRefreshRate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Caches the primary monitor's refresh rate.
    ///
    /// Returns `true` if the cached value changed, in which case the caller
    /// should notify the `DisplayTimingProvider`.
    pub fn observe_primary(&self, event_loop: &ActiveEventLoop) -> bool {
        self.observe_monitor(event_loop.primary_monitor().as_ref())
    }

    /// Caches the refresh rate of `monitor`; `None` marks the rate unknown.
    pub fn observe_monitor(&self, monitor: Option<&MonitorHandle>) -> bool {
        let mhz = monitor
            .and_then(MonitorHandle::refresh_rate_millihertz)
            .unwrap_or(0);
        self.set_millihertz(mhz)
    }

    pub fn set_millihertz(&self, mhz: u32) -> bool {
        self.millihertz.swap(mhz, Ordering::AcqRel) != mhz
    }
}

impl RefreshRateSource for WinitRefreshRate {
    fn refresh_rate_hz(&self) -> Result<f64, PacerError> {
        match self.millihertz.load(Ordering::Acquire) {
            0 => Err(PacerError::RefreshRateUnavailable),
            mhz => Ok(f64::from(mhz) / 1000.0),
        }
    }
}
