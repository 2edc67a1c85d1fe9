//! Platform refresh-rate sources.

mod winit;

pub use self::winit::WinitRefreshRate;
