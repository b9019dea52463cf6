//! Control link wire format.
//!
//! # Framing
//!
//! One JSON object per line, terminated by a single `\n`. No length prefix:
//! the receiver splits on newlines.
//!
//! ```text
//! {"type":"hello","client_id":"sarathi-linux","version":1}
//! {"type":"twist","seq":0,"ts":1712345678.123,"vx":0.25,"vy":0.0,"vz":0.0,"roll":0.0,"pitch":-1.5,"yaw":0.0}
//! {"type":"bye","reason":"app_stopped"}
//! ```
//!
//! `type` is always the first key, the remaining keys follow in the order
//! shown. Every float is rounded to 3 decimal places before encoding; the
//! receiver may rely on that bounded precision.

use crate::control::ControlVector;
use serde::Serialize;

/// Protocol version announced in the hello handshake
pub const PROTOCOL_VERSION: u32 = 1;

/// Why a control link connection is being closed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ByeReason {
    /// A write failed; the link will reconnect
    Error,
    /// The operator stopped the link
    AppStopped,
}

/// Outbound control link record.
#[derive(Clone, Debug, PartialEq)]
pub enum TelemetryMessage {
    Hello { client_id: String, version: u32 },
    Twist {
        seq: u64,
        /// Seconds since the UNIX epoch
        timestamp: f64,
        control: ControlVector,
    },
    Bye { reason: ByeReason },
}

/// Serialized shape of a record; field order here is the wire order.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireRecord<'a> {
    Hello {
        client_id: &'a str,
        version: u32,
    },
    Twist {
        seq: u64,
        ts: f64,
        vx: f64,
        vy: f64,
        vz: f64,
        roll: f64,
        pitch: f64,
        yaw: f64,
    },
    Bye {
        reason: ByeReason,
    },
}

/// Round to 3 decimal places (half away from zero), normalizing `-0.0`.
#[inline]
pub fn round3(value: f64) -> f64 {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 { 0.0 } else { rounded }
}

impl TelemetryMessage {
    pub fn hello(client_id: impl Into<String>) -> Self {
        TelemetryMessage::Hello {
            client_id: client_id.into(),
            version: PROTOCOL_VERSION,
        }
    }

    pub fn twist(seq: u64, timestamp: f64, control: ControlVector) -> Self {
        TelemetryMessage::Twist {
            seq,
            timestamp,
            control,
        }
    }

    pub fn bye(reason: ByeReason) -> Self {
        TelemetryMessage::Bye { reason }
    }

    /// Encode into one newline-terminated JSON line.
    pub fn encode(&self) -> Vec<u8> {
        let mut line = Vec::with_capacity(160);
        self.encode_into(&mut line);
        line
    }

    /// Append the encoded line to `out` (reuses the caller's buffer).
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let record = match self {
            TelemetryMessage::Hello { client_id, version } => WireRecord::Hello {
                client_id,
                version: *version,
            },
            TelemetryMessage::Twist {
                seq,
                timestamp,
                control,
            } => WireRecord::Twist {
                seq: *seq,
                ts: round3(*timestamp),
                vx: round3(control.vx as f64),
                vy: round3(control.vy as f64),
                vz: round3(control.vz as f64),
                roll: round3(control.roll as f64),
                pitch: round3(control.pitch as f64),
                yaw: round3(control.yaw as f64),
            },
            TelemetryMessage::Bye { reason } => WireRecord::Bye { reason: *reason },
        };

        // Writing plain structs into a Vec cannot fail
        if let Err(e) = serde_json::to_writer(&mut *out, &record) {
            tracing::error!("Failed to encode {:?}: {}", self, e);
            return;
        }
        out.push(b'\n');
    }

    /// Record type tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryMessage::Hello { .. } => "hello",
            TelemetryMessage::Twist { .. } => "twist",
            TelemetryMessage::Bye { .. } => "bye",
        }
    }
}
