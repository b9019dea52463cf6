//! One control link connection.
//!
//! A session exists from a successful connect until the first write failure
//! or an explicit close. Its `seq` counter starts at 0 and is never carried
//! over to the next connection.

use super::codec::{ByeReason, TelemetryMessage};
use crate::control::ControlVector;
use crate::error::{Result, SarathiError};
use crate::net::{Connector, LinkStream};
use std::io::Write;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seconds since the UNIX epoch at millisecond precision.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as f64 / 1000.0)
        .unwrap_or(0.0)
}

/// Open control link connection with its per-connection sequence counter.
pub struct Session {
    stream: Box<dyn LinkStream>,
    seq: u64,
    /// Reused line buffer
    line: Vec<u8>,
}

impl Session {
    /// Connect and perform the hello handshake.
    ///
    /// If the hello cannot be written the connection is torn down (with a
    /// best-effort `bye{error}`) and the write error is returned.
    pub fn open(connector: &dyn Connector, timeout: Duration, client_id: &str) -> Result<Self> {
        let stream = connector.connect(timeout)?;
        let mut session = Self {
            stream,
            seq: 0,
            line: Vec::with_capacity(256),
        };

        if let Err(e) = session.send(&TelemetryMessage::hello(client_id)) {
            session.close(ByeReason::Error);
            return Err(e);
        }

        Ok(session)
    }

    /// Sequence number the next twist will carry.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Write one twist for `control` and advance `seq`.
    pub fn send_twist(&mut self, control: ControlVector, timestamp: f64) -> Result<()> {
        let msg = TelemetryMessage::twist(self.seq, timestamp, control);
        self.send(&msg)?;
        tracing::trace!("twist seq={} {:?}", self.seq, control);
        self.seq += 1;
        Ok(())
    }

    /// Send a best-effort `bye` and close the transport. Errors are swallowed:
    /// the connection is going away either way.
    pub fn close(mut self, reason: ByeReason) {
        if let Err(e) = self.send(&TelemetryMessage::bye(reason)) {
            tracing::debug!("bye({:?}) not delivered: {}", reason, e);
        }
        if let Err(e) = self.stream.close() {
            tracing::debug!("Error closing control link: {}", e);
        }
    }

    fn send(&mut self, msg: &TelemetryMessage) -> Result<()> {
        self.line.clear();
        msg.encode_into(&mut self.line);
        self.stream
            .write_all(&self.line)
            .map_err(SarathiError::Write)?;
        self.stream.flush().map_err(SarathiError::Write)
    }
}
