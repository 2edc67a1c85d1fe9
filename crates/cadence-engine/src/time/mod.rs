//! Time subsystem.
//!
//! All release and vsync timestamps handled by the pacer are signed
//! nanoseconds on one monotonic timebase. `MonotonicClock` provides that
//! timebase for hosts that do not already have one.

mod monotonic;

pub use monotonic::{MonotonicClock, NANOS_PER_MICRO, NANOS_PER_SECOND};
