use crate::time::{MonotonicClock, NANOS_PER_SECOND};

/// Platform hook that reports display vsync timestamps.
///
/// Called only from the vsync timing thread. Implementations return the
/// timestamp of the most recent vsync edge on the pacer's monotonic
/// nanosecond timebase, or `None` if the display has not produced one yet.
pub trait VsyncSignal: Send + 'static {
    fn latest_vsync_ns(&mut self) -> Option<i64>;
}

impl<F> VsyncSignal for F
where
    F: FnMut() -> Option<i64> + Send + 'static,
{
    fn latest_vsync_ns(&mut self) -> Option<i64> {
        self()
    }
}

/// Vsync edges derived from a fixed refresh period.
///
/// Used where the platform exposes a refresh rate but no vsync timestamps.
/// Edges are `phase_ns + k * period_ns` on the process clock.
#[derive(Debug, Clone)]
pub struct SyntheticVsync {
    clock: MonotonicClock,
    period_ns: i64,
    phase_ns: i64,
}

impl SyntheticVsync {
    /// Creates a signal with edges at multiples of `period_ns` from the process epoch.
    pub fn new(period_ns: i64) -> Self {
        Self::with_clock(MonotonicClock::process(), period_ns, 0)
    }

    /// Creates a signal for a refresh rate in Hz.
    ///
    /// Returns `None` for rates that do not yield a positive period.
    pub fn from_refresh_rate(refresh_rate_hz: f64) -> Option<Self> {
        if !refresh_rate_hz.is_finite() || refresh_rate_hz <= 0.0 {
            return None;
        }
        let period_ns = (NANOS_PER_SECOND as f64 / refresh_rate_hz) as i64;
        (period_ns > 0).then(|| Self::new(period_ns))
    }

    pub fn with_clock(clock: MonotonicClock, period_ns: i64, phase_ns: i64) -> Self {
        debug_assert!(period_ns > 0);
        Self {
            clock,
            period_ns: period_ns.max(1),
            phase_ns,
        }
    }

    /// Latest edge at or before `now_ns`.
    pub fn edge_at_or_before(&self, now_ns: i64) -> i64 {
        let cycles = (now_ns - self.phase_ns).div_euclid(self.period_ns);
        self.phase_ns + cycles * self.period_ns
    }

    pub fn period_ns(&self) -> i64 {
        self.period_ns
    }
}

impl VsyncSignal for SyntheticVsync {
    fn latest_vsync_ns(&mut self) -> Option<i64> {
        Some(self.edge_at_or_before(self.clock.now_ns()))
    }
}
