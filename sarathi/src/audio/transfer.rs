//! One-shot audio upload.
//!
//! The take is written as a single raw PCM payload on a fresh connection:
//! no header, no length prefix, no acknowledgment. The receiver reads until
//! EOF, so closing the connection is what delimits the clip. A failed upload
//! is final for that take.

use super::capture::AudioBuffer;
use crate::error::{Result, SarathiError};
use crate::net::Connector;
use std::io::Write;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Result of one upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferOutcome {
    Sent { bytes: usize },
    Failed { error: String },
}

/// Uploads finished takes to the audio port.
#[derive(Clone)]
pub struct AudioTransfer {
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
}

impl AudioTransfer {
    pub fn new(connector: Arc<dyn Connector>, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connect_timeout,
        }
    }

    /// Upload `buffer` on the calling thread. Returns the bytes written.
    pub fn send(&self, buffer: &AudioBuffer) -> Result<usize> {
        let started = Instant::now();
        let mut stream = self.connector.connect(self.connect_timeout)?;

        let written = stream
            .write_all(buffer.as_bytes())
            .and_then(|()| stream.flush());
        if let Err(e) = written {
            let _ = stream.close();
            return Err(SarathiError::Write(e));
        }
        stream.close().map_err(SarathiError::Write)?;

        info!(
            "Uploaded {} bytes to {} in {:?}",
            buffer.len(),
            self.connector.endpoint(),
            started.elapsed()
        );
        Ok(buffer.len())
    }

    /// Upload `buffer` on a background thread.
    pub fn spawn(&self, buffer: AudioBuffer) -> Result<TransferHandle> {
        let transfer = self.clone();
        let handle = thread::Builder::new()
            .name("audio-send".into())
            .spawn(move || match transfer.send(&buffer) {
                Ok(bytes) => TransferOutcome::Sent { bytes },
                Err(e) => {
                    warn!("Audio upload failed: {}", e);
                    TransferOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            })
            .map_err(|e| SarathiError::ThreadSpawn(format!("audio-send: {}", e)))?;
        Ok(TransferHandle { handle })
    }
}

/// An upload running in the background.
pub struct TransferHandle {
    handle: JoinHandle<TransferOutcome>,
}

impl TransferHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the upload to finish.
    pub fn join(self) -> TransferOutcome {
        self.handle.join().unwrap_or_else(|_| TransferOutcome::Failed {
            error: "audio-send thread panicked".into(),
        })
    }
}
