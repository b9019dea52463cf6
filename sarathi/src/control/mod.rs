//! Operator intent: the shared control vector and the joystick adapter that
//! feeds it.
//!
//! - [`ControlStateStore`]: lock-guarded current intent, read by the control
//!   link thread via whole-vector snapshots
//! - [`InputAdapter`]: clamps normalized stick values and scales them into
//!   physical units before they reach the store

mod input;
mod store;

pub use input::InputAdapter;
pub use store::{AxisGroup, ControlStateStore, ControlVector, SharedControl};
