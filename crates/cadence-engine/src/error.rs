use std::fmt;
use std::io;

/// Errors raised while wiring the pacer to the platform.
///
/// The smoothing path itself never fails; these only surface from setup code
/// and from display reads, which callers are expected to tolerate.
#[derive(Debug)]
pub enum PacerError {
    /// The vsync timing thread could not be started.
    ThreadSpawn(io::Error),
    /// The display did not report a refresh rate.
    RefreshRateUnavailable,
    /// The display reported a refresh rate that cannot produce a vsync period.
    InvalidRefreshRate(f64),
}

impl fmt::Display for PacerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThreadSpawn(e) => write!(f, "failed to spawn vsync timing thread: {e}"),
            Self::RefreshRateUnavailable => write!(f, "display refresh rate unavailable"),
            Self::InvalidRefreshRate(hz) => write!(f, "invalid display refresh rate: {hz} Hz"),
        }
    }
}

impl std::error::Error for PacerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ThreadSpawn(e) => Some(e),
            _ => None,
        }
    }
}
