//! Control link: hello, a fixed-rate twist stream, and bye.

pub mod codec;
mod link;
mod session;

pub use codec::{ByeReason, PROTOCOL_VERSION, TelemetryMessage, round3};
pub use link::{LinkSettings, LinkState, LinkStatus, TelemetryLink};
pub use session::{Session, unix_timestamp};
