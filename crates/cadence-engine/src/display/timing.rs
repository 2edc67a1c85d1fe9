use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use crate::error::PacerError;
use crate::time::NANOS_PER_SECOND;

/// Reads the default display's refresh rate.
pub trait RefreshRateSource: Send + Sync {
    fn refresh_rate_hz(&self) -> Result<f64, PacerError>;
}

/// Refresh-rate source with a constant value.
#[derive(Debug, Copy, Clone)]
pub struct FixedRefreshRate(pub f64);

impl RefreshRateSource for FixedRefreshRate {
    fn refresh_rate_hz(&self) -> Result<f64, PacerError> {
        Ok(self.0)
    }
}

/// Display timing configuration.
#[derive(Debug, Clone)]
pub struct DisplayTimingConfig {
    /// Release offset as a percentage of the vsync period.
    ///
    /// Frames are released this far ahead of the targeted vsync, i.e. after
    /// the previous one.
    pub offset_percent: i64,
}

impl Default for DisplayTimingConfig {
    fn default() -> Self {
        Self { offset_percent: 80 }
    }
}

/// Vsync period and release offset of a display.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VsyncTiming {
    /// Always positive.
    pub duration_ns: i64,
    pub offset_ns: i64,
}

impl VsyncTiming {
    pub fn from_refresh_rate(refresh_rate_hz: f64, offset_percent: i64) -> Result<Self, PacerError> {
        if !refresh_rate_hz.is_finite() || refresh_rate_hz <= 0.0 {
            return Err(PacerError::InvalidRefreshRate(refresh_rate_hz));
        }
        let duration_ns = (NANOS_PER_SECOND as f64 / refresh_rate_hz) as i64;
        if duration_ns <= 0 {
            return Err(PacerError::InvalidRefreshRate(refresh_rate_hz));
        }
        Ok(Self {
            duration_ns,
            offset_ns: duration_ns * offset_percent / 100,
        })
    }
}

/// Vsync timing of the default display, shared by every session.
///
/// Sessions register while they are enabled. The platform calls
/// `on_display_changed` on configuration changes; it is ignored while no
/// session is registered. Reads may observe a duration and offset from two
/// different updates, which is acceptable for a best-effort target.
pub struct DisplayTimingProvider {
    source: Arc<dyn RefreshRateSource>,
    offset_percent: i64,
    duration_ns: AtomicI64,
    offset_ns: AtomicI64,
    registrations: AtomicUsize,
}

impl DisplayTimingProvider {
    pub fn new(source: Arc<dyn RefreshRateSource>, config: DisplayTimingConfig) -> Self {
        Self {
            source,
            offset_percent: config.offset_percent,
            duration_ns: AtomicI64::new(0),
            offset_ns: AtomicI64::new(0),
            registrations: AtomicUsize::new(0),
        }
    }

    /// Current timing, or `None` until a refresh rate has been read.
    pub fn timing(&self) -> Option<VsyncTiming> {
        let duration_ns = self.duration_ns.load(Ordering::Acquire);
        if duration_ns <= 0 {
            return None;
        }
        Some(VsyncTiming {
            duration_ns,
            offset_ns: self.offset_ns.load(Ordering::Acquire),
        })
    }

    /// Starts listening for display changes and recomputes the timing.
    pub fn register(&self) {
        self.registrations.fetch_add(1, Ordering::AcqRel);
        self.refresh();
    }

    pub fn unregister(&self) {
        let result = self
            .registrations
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if result.is_err() {
            log::warn!("display timing unregistered with no registrations");
        }
    }

    pub fn registrations(&self) -> usize {
        self.registrations.load(Ordering::Acquire)
    }

    /// Platform notification that the default display's configuration changed.
    pub fn on_display_changed(&self) {
        if self.registrations() > 0 {
            self.refresh();
        }
    }

    /// Re-reads the refresh rate.
    ///
    /// On failure the previous timing is kept so a transient read error does
    /// not disable vsync snapping. Returns whether new values were stored.
    pub fn refresh(&self) -> bool {
        let timing = self
            .source
            .refresh_rate_hz()
            .and_then(|hz| VsyncTiming::from_refresh_rate(hz, self.offset_percent));

        match timing {
            Ok(timing) => {
                self.offset_ns.store(timing.offset_ns, Ordering::Release);
                self.duration_ns.store(timing.duration_ns, Ordering::Release);
                log::debug!(
                    "display vsync period {} ns, release offset {} ns",
                    timing.duration_ns,
                    timing.offset_ns
                );
                true
            }
            Err(e) => {
                log::debug!("keeping previous display timing: {e}");
                false
            }
        }
    }
}
