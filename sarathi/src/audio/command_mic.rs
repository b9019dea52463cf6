//! Microphone backed by an external recorder process.
//!
//! The configured command must write raw S16LE, 16 kHz, mono PCM to stdout
//! (e.g. `arecord -q -t raw -f S16_LE -r 16000 -c 1`). Each take runs a fresh
//! process; closing the session kills it. The recorder closing its stdout
//! surfaces as `UnexpectedEof`, which ends the take.

use super::capture::{MicrophoneSession, MicrophoneSource};
use crate::error::{Result, SarathiError};
use std::io::{self, Read};
use std::process::{Child, ChildStdout, Command, Stdio};
use tracing::{debug, info};

/// [`MicrophoneSource`] that spawns `capture_command` per take.
#[derive(Clone, Debug)]
pub struct CommandMicrophone {
    command: Vec<String>,
}

impl CommandMicrophone {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl MicrophoneSource for CommandMicrophone {
    /// Without a configured recorder there is no microphone access.
    fn permission_granted(&self) -> bool {
        !self.command.is_empty()
    }

    fn open(&self) -> Result<Box<dyn MicrophoneSession>> {
        let Some((program, args)) = self.command.split_first() else {
            return Err(SarathiError::PermissionDenied);
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SarathiError::Capture(format!("failed to run {}: {}", program, e)))?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SarathiError::Capture(format!("{} has no stdout", program)));
        };

        info!("Microphone recorder started: {} (pid {})", program, child.id());
        Ok(Box::new(CommandSession { child, stdout }))
    }
}

struct CommandSession {
    child: Child,
    stdout: ChildStdout,
}

impl MicrophoneSession for CommandSession {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stdout.read(buf)? {
            0 if !buf.is_empty() => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "recorder output ended",
            )),
            n => Ok(n),
        }
    }

    fn close(&mut self) {
        // Already exited is fine
        if let Err(e) = self.child.kill() {
            debug!("Recorder kill: {}", e);
        }
        match self.child.wait() {
            Ok(status) => debug!("Recorder exited: {}", status),
            Err(e) => debug!("Recorder wait failed: {}", e),
        }
    }
}
