//! Error types for Sarathi

use std::io;
use thiserror::Error;

/// Sarathi error type
#[derive(Error, Debug)]
pub enum SarathiError {
    /// Microphone access has not been granted to this client
    #[error("Microphone permission denied")]
    PermissionDenied,

    #[error("Connection timed out: {0}")]
    ConnectTimeout(String),

    #[error("Connection refused: {0}")]
    ConnectRefused(String),

    #[error("Connection failed: {0}")]
    Connect(#[source] io::Error),

    #[error("Write failed: {0}")]
    Write(#[source] io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Failed to spawn thread: {0}")]
    ThreadSpawn(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl SarathiError {
    /// Classify an error returned while opening a connection to `addr`.
    pub fn from_connect(addr: &str, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
                SarathiError::ConnectTimeout(addr.to_string())
            }
            io::ErrorKind::ConnectionRefused => SarathiError::ConnectRefused(addr.to_string()),
            _ => SarathiError::Connect(e),
        }
    }

    /// True for failures of the network path (connect or write).
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            SarathiError::ConnectTimeout(_)
                | SarathiError::ConnectRefused(_)
                | SarathiError::Connect(_)
                | SarathiError::Write(_)
        )
    }
}

impl From<toml::de::Error> for SarathiError {
    fn from(e: toml::de::Error) -> Self {
        SarathiError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SarathiError>;
