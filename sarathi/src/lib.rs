//! Sarathi - teleoperation client
//!
//! Drives a remote device over two independent TCP links:
//!
//! - **Control link**: a `hello`, then a `twist` every send period carrying the
//!   latest joystick state, then a `bye`. Reconnects on its own after a fixed
//!   backoff whenever the connection drops.
//! - **Audio upload**: a recorded take is sent as one raw PCM payload on a
//!   fresh connection once recording stops.
//!
//! ```text
//! InputAdapter → ControlStateStore → TelemetryLink → control port
//! AudioCapture → AudioBuffer → AudioTransfer → audio port
//! ```

pub mod app;
pub mod audio;
pub mod config;
pub mod console;
pub mod control;
pub mod error;
pub mod net;
pub mod telemetry;

pub use app::{Operator, Reply};
pub use config::SarathiConfig;
pub use error::{Result, SarathiError};
