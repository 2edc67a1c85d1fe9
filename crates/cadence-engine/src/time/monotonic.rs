use std::sync::OnceLock;
use std::time::{Duration, Instant};

pub const NANOS_PER_SECOND: i64 = 1_000_000_000;
pub const NANOS_PER_MICRO: i64 = 1_000;

static PROCESS_EPOCH: OnceLock<Instant> = OnceLock::new();

/// Monotonic nanosecond timebase.
///
/// Clones share the same epoch, so timestamps from any clone are directly
/// comparable. `MonotonicClock::process()` returns a clock anchored at the
/// first use in the process, which is what the vsync sampler and the demo
/// release loop both use.
#[derive(Debug, Copy, Clone)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    /// Creates a clock whose zero is the current instant.
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Creates a clock from an existing epoch.
    pub fn from_instant(epoch: Instant) -> Self {
        Self { epoch }
    }

    /// Returns the process-wide clock.
    pub fn process() -> Self {
        Self {
            epoch: *PROCESS_EPOCH.get_or_init(Instant::now),
        }
    }

    /// Nanoseconds elapsed since the epoch.
    #[inline]
    pub fn now_ns(&self) -> i64 {
        self.ns_at(Instant::now())
    }

    /// Nanoseconds between the epoch and `instant`.
    ///
    /// Instants before the epoch map to negative values.
    pub fn ns_at(&self, instant: Instant) -> i64 {
        match instant.checked_duration_since(self.epoch) {
            Some(d) => duration_to_ns(d),
            None => -duration_to_ns(self.epoch.duration_since(instant)),
        }
    }

    /// Converts a timestamp on this timebase back to an `Instant`.
    pub fn instant_at(&self, ns: i64) -> Instant {
        let offset = Duration::from_nanos(ns.unsigned_abs());
        if ns >= 0 {
            self.epoch + offset
        } else {
            self.epoch.checked_sub(offset).unwrap_or(self.epoch)
        }
    }

    pub fn epoch(&self) -> Instant {
        self.epoch
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

// Saturates after ~292 years of uptime.
fn duration_to_ns(d: Duration) -> i64 {
    i64::try_from(d.as_nanos()).unwrap_or(i64::MAX)
}
