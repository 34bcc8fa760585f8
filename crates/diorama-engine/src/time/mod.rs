//! Time subsystem.
//!
//! - one [`FrameClock`] per render loop, `tick()` once per presented frame
//! - a [`ReconcileCadence`] deciding which of those frames also reconcile

mod cadence;
mod frame_clock;

pub use cadence::ReconcileCadence;
pub use frame_clock::{FrameClock, FrameTime};
