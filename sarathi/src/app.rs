//! Operator session: wires the console to both pipelines.
//!
//! Owns the control store and input adapter, the control link, the capture
//! pipeline and at most one upload in flight. A new take cannot start while
//! the previous upload is still running.

use crate::audio::{
    AudioBuffer, AudioCapture, AudioTransfer, CommandMicrophone, MicrophoneSource, TransferHandle,
    TransferOutcome,
};
use crate::config::SarathiConfig;
use crate::console::{OperatorCommand, USAGE};
use crate::control::{ControlStateStore, InputAdapter, SharedControl};
use crate::error::Result;
use crate::net::{Connector, TcpConnector};
use crate::telemetry::{LinkSettings, LinkState, LinkStatus, TelemetryLink};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// What the console should do after a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Silent,
    Text(String),
    Quit,
}

/// Console-driven teleoperation session.
pub struct Operator {
    input: InputAdapter,
    link: TelemetryLink,
    link_events: Receiver<LinkStatus>,
    capture: AudioCapture,
    transfer: AudioTransfer,
    /// Upload still running, if any
    pending: Option<TransferHandle>,
    upload_wait: Duration,
}

impl Operator {
    /// Build a session talking TCP to the configured host.
    pub fn from_config(config: &SarathiConfig) -> Self {
        Self::new(
            config,
            Arc::new(TcpConnector::new(config.control_address())),
            Arc::new(TcpConnector::new(config.audio_address())),
            Arc::new(CommandMicrophone::new(config.audio.capture_command.clone())),
        )
    }

    pub fn new(
        config: &SarathiConfig,
        control_connector: Arc<dyn Connector>,
        audio_connector: Arc<dyn Connector>,
        microphone: Arc<dyn MicrophoneSource>,
    ) -> Self {
        let store: SharedControl = ControlStateStore::shared();
        let (tx, link_events) = crossbeam_channel::unbounded();

        let link = TelemetryLink::new(
            control_connector,
            Arc::clone(&store),
            LinkSettings::from_config(config),
        )
        .with_status(tx);

        Self {
            input: InputAdapter::new(store, &config.limits),
            link,
            link_events,
            capture: AudioCapture::new(microphone, &config.audio),
            transfer: AudioTransfer::new(audio_connector, config.connect_timeout()),
            pending: None,
            upload_wait: config.connect_timeout(),
        }
    }

    /// Start streaming to the control port.
    pub fn start(&mut self) -> Result<()> {
        self.link.start()
    }

    /// Apply one console command.
    pub fn handle(&mut self, cmd: OperatorCommand) -> Result<Reply> {
        let reply = match cmd {
            OperatorCommand::Planar { x, y } => {
                self.input.planar(x, y);
                Reply::Silent
            }
            OperatorCommand::Vertical { v } => {
                self.input.vertical(v);
                Reply::Silent
            }
            OperatorCommand::PitchYaw { x, y } => {
                self.input.pitch_yaw(x, y);
                Reply::Silent
            }
            OperatorCommand::Roll { v } => {
                self.input.roll(v);
                Reply::Silent
            }
            OperatorCommand::Center => {
                self.input.center();
                Reply::Text("sticks centered".into())
            }
            OperatorCommand::Record => self.record()?,
            OperatorCommand::Send => self.send()?,
            OperatorCommand::Status => Reply::Text(self.status()),
            OperatorCommand::Help => Reply::Text(USAGE.into()),
            OperatorCommand::Quit => Reply::Quit,
        };
        Ok(reply)
    }

    fn record(&mut self) -> Result<Reply> {
        self.poll_transfer();
        if self.pending.is_some() {
            return Ok(Reply::Text("upload in progress, try again when it finishes".into()));
        }
        if self.capture.is_recording() {
            return Ok(Reply::Text("already recording".into()));
        }
        self.capture.start()?;
        Ok(Reply::Text("recording".into()))
    }

    fn send(&mut self) -> Result<Reply> {
        let Some(take) = self.capture.stop() else {
            return Ok(Reply::Text("not recording".into()));
        };
        if take.is_empty() {
            info!("Empty take, nothing to upload");
            return Ok(Reply::Text("empty take, nothing to upload".into()));
        }
        let bytes = take.len();
        self.upload(take)?;
        Ok(Reply::Text(format!("uploading {} bytes", bytes)))
    }

    fn upload(&mut self, take: AudioBuffer) -> Result<()> {
        self.pending = Some(self.transfer.spawn(take)?);
        Ok(())
    }

    /// Collect the finished upload, if there is one.
    pub fn poll_transfer(&mut self) -> Option<TransferOutcome> {
        if !self.pending.as_ref()?.is_finished() {
            return None;
        }
        let outcome = self.pending.take()?.join();
        match &outcome {
            TransferOutcome::Sent { bytes } => info!("Audio upload complete: {} bytes", bytes),
            TransferOutcome::Failed { error } => warn!("Audio upload failed: {}", error),
        }
        Some(outcome)
    }

    /// Link status reports not yet consumed.
    pub fn link_events(&self) -> &Receiver<LinkStatus> {
        &self.link_events
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn is_recording(&self) -> bool {
        self.capture.is_recording()
    }

    pub fn transfer_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn control(&self) -> &SharedControl {
        self.input.store()
    }

    /// One-line summary for the `status` command.
    pub fn status(&mut self) -> String {
        self.poll_transfer();
        let c = self.input.store().snapshot();
        let audio = if self.capture.is_recording() {
            format!("recording ({} bytes)", self.capture.captured_bytes())
        } else if self.pending.is_some() {
            "uploading".to_string()
        } else {
            "idle".to_string()
        };
        format!(
            "link {:?} ({}) | vx={:.3} vy={:.3} vz={:.3} roll={:.3} pitch={:.3} yaw={:.3} | audio {}",
            self.link.state(),
            self.link.endpoint(),
            c.vx,
            c.vy,
            c.vz,
            c.roll,
            c.pitch,
            c.yaw,
            audio
        )
    }

    /// Stop both pipelines. An in-flight upload gets up to the connect
    /// timeout to finish; a take still recording is discarded.
    pub fn shutdown(&mut self) {
        if let Some(take) = self.capture.stop() {
            info!("Discarding unsent take of {} bytes", take.len());
        }
        self.link.stop();

        let deadline = Instant::now() + self.upload_wait;
        while self.pending.is_some() && Instant::now() < deadline {
            if self.poll_transfer().is_none() {
                thread::sleep(Duration::from_millis(10));
            }
        }
        if self.pending.take().is_some() {
            warn!("Audio upload still running at exit; abandoning it");
        }
    }
}
