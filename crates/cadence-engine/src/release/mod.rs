//! Frame release timing.
//!
//! One `ReleaseTimeSmoother` per playback session. The renderer records each
//! candidate frame, then asks for its adjusted release time as often as it
//! likes before handing the frame to the display.

mod register;
mod smoother;
mod snap;

pub use register::TwoSlot;
pub use smoother::{AdjustedFrame, ReleaseTimeSmoother, SmootherConfig, SyncAnchor};
pub use snap::closest_vsync;
