//! Transport layer for the control link and the audio upload.
//!
//! Both links only ever connect, write, and close. They talk to the network
//! through [`Connector`] so the state machines can be exercised against an
//! in-memory transport.

#[cfg(test)]
pub(crate) mod mock;

use crate::error::{Result, SarathiError};
use std::io::{self, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// An open, write-only connection.
pub trait LinkStream: Write + Send {
    /// Close the connection. Buffered bytes are flushed first.
    fn close(&mut self) -> io::Result<()>;
}

/// Opens connections to a fixed endpoint.
pub trait Connector: Send + Sync {
    /// Endpoint description used in logs and status reports
    fn endpoint(&self) -> &str;

    /// Open a new connection, giving up after `timeout`.
    fn connect(&self, timeout: Duration) -> Result<Box<dyn LinkStream>>;
}

/// Plain TCP connector (Nagle disabled, since twists are small and periodic).
#[derive(Clone, Debug)]
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

impl Connector for TcpConnector {
    fn endpoint(&self) -> &str {
        &self.addr
    }

    fn connect(&self, timeout: Duration) -> Result<Box<dyn LinkStream>> {
        let addrs = self
            .addr
            .to_socket_addrs()
            .map_err(|e| SarathiError::from_connect(&self.addr, e))?;

        // Try every resolved address; report the last failure
        let mut last_err = io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("{} did not resolve to any address", self.addr),
        );
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!("Failed to set TCP_NODELAY on {}: {}", addr, e);
                    }
                    // A stalled peer must not wedge the writer forever
                    stream.set_write_timeout(Some(timeout))?;
                    return Ok(Box::new(TcpLink { stream }));
                }
                Err(e) => last_err = e,
            }
        }

        Err(SarathiError::from_connect(&self.addr, last_err))
    }
}

/// Connected TCP stream.
struct TcpLink {
    stream: TcpStream,
}

impl Write for TcpLink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl LinkStream for TcpLink {
    fn close(&mut self) -> io::Result<()> {
        self.stream.flush()?;
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != io::ErrorKind::NotConnected => Err(e),
            _ => Ok(()),
        }
    }
}
