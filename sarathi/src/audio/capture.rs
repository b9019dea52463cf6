//! Microphone capture.
//!
//! One take runs from [`AudioCapture::start`] to [`AudioCapture::stop`]. A
//! sampling thread owns the microphone session for the take, performs
//! blocking frame-sized reads and appends them to the take's buffer. `stop()`
//! raises the take's stop flag, waits a bounded time for the thread, and then
//! moves the buffer out.
//!
//! The stop flag is checked under the buffer lock before every append, so
//! once `stop()` has raised it no more bytes land in the buffer, even if the
//! thread is still parked in a read and gets detached.

use crate::config::AudioConfig;
use crate::error::{Result, SarathiError};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const JOIN_POLL: Duration = Duration::from_millis(5);

/// Access to a microphone.
pub trait MicrophoneSource: Send + Sync {
    /// Whether the operator has granted microphone access.
    fn permission_granted(&self) -> bool;

    /// Open a capture session (16 kHz, mono, S16LE).
    fn open(&self) -> Result<Box<dyn MicrophoneSession>>;
}

/// An open capture session, owned by the sampling thread.
pub trait MicrophoneSession: Send {
    /// Blocking read of up to `buf.len()` bytes of PCM. `Ok(0)` means no
    /// samples this time; a source that has run dry reports
    /// `io::ErrorKind::UnexpectedEof`.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Release the device.
    fn close(&mut self);
}

/// PCM bytes of one finished take.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AudioBuffer(Vec<u8>);

impl AudioBuffer {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for AudioBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Buffer and stop flag of the take in progress.
struct Take {
    buffer: Arc<Mutex<Vec<u8>>>,
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Capture pipeline: `Idle` until `start()`, `Recording` until `stop()`.
pub struct AudioCapture {
    source: Arc<dyn MicrophoneSource>,
    frame_bytes: usize,
    stop_timeout: Duration,
    take: Option<Take>,
}

impl AudioCapture {
    pub fn new(source: Arc<dyn MicrophoneSource>, config: &AudioConfig) -> Self {
        Self {
            source,
            frame_bytes: config.frame_bytes,
            stop_timeout: Duration::from_millis(config.capture_stop_timeout_ms),
            take: None,
        }
    }

    /// Begin a new take.
    ///
    /// Fails with [`SarathiError::PermissionDenied`] when microphone access
    /// is not granted. Calling this while already recording does nothing.
    pub fn start(&mut self) -> Result<()> {
        if self.take.is_some() {
            debug!("Capture already recording; start ignored");
            return Ok(());
        }
        if !self.source.permission_granted() {
            warn!("Capture refused: microphone permission not granted");
            return Err(SarathiError::PermissionDenied);
        }

        let session = self.source.open()?;
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));

        let thread_buffer = Arc::clone(&buffer);
        let thread_stop = Arc::clone(&stop);
        let frame_bytes = self.frame_bytes;

        let handle = thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || sample_loop(session, frame_bytes, thread_buffer, thread_stop))
            .map_err(|e| SarathiError::ThreadSpawn(format!("audio-capture: {}", e)))?;

        self.take = Some(Take {
            buffer,
            stop,
            handle,
        });
        info!("Recording started");
        Ok(())
    }

    /// End the take and hand over its buffer. Returns `None` when idle.
    pub fn stop(&mut self) -> Option<AudioBuffer> {
        let take = self.take.take()?;
        take.stop.store(true, Ordering::Release);

        let deadline = Instant::now() + self.stop_timeout;
        while !take.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(JOIN_POLL);
        }
        if take.handle.is_finished() {
            if take.handle.join().is_err() {
                error!("Capture thread panicked");
            }
        } else {
            warn!(
                "Capture thread still blocked in read after {:?}; detaching",
                self.stop_timeout
            );
        }

        let bytes = std::mem::take(&mut *take.buffer.lock());
        info!("Recording stopped: {} bytes captured", bytes.len());
        Some(AudioBuffer(bytes))
    }

    pub fn is_recording(&self) -> bool {
        self.take.is_some()
    }

    /// Bytes captured so far in the current take (0 when idle).
    pub fn captured_bytes(&self) -> usize {
        self.take.as_ref().map_or(0, |t| t.buffer.lock().len())
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

fn sample_loop(
    mut session: Box<dyn MicrophoneSession>,
    frame_bytes: usize,
    buffer: Arc<Mutex<Vec<u8>>>,
    stop: Arc<AtomicBool>,
) {
    let mut frame = vec![0u8; frame_bytes];
    let mut reads: u64 = 0;

    while !stop.load(Ordering::Acquire) {
        match session.read(&mut frame) {
            Ok(0) => continue,
            Ok(n) => {
                let mut buf = buffer.lock();
                if stop.load(Ordering::Acquire) {
                    break;
                }
                buf.extend_from_slice(&frame[..n]);
                reads += 1;
                if reads % 50 == 0 {
                    debug!("Captured {} bytes", buf.len());
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                info!("Microphone stream ended after {} reads", reads);
                break;
            }
            Err(e) => {
                error!("Microphone read failed, ending take early: {}", e);
                break;
            }
        }
    }

    session.close();
    debug!("Capture thread exiting");
}
