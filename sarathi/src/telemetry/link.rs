//! Control link manager.
//!
//! A single background thread owns the control link transport and keeps a
//! twist stream flowing to the receiver for as long as the link is started.
//!
//! # State Machine
//!
//! ```text
//!              start()
//!                 │
//!                 ▼
//! ┌──────────────────┐  connect ok + hello  ┌──────────────┐
//! │ Connecting       │ ───────────────────▶ │ Connected    │──┐ every send_period:
//! │                  │                      │              │◀─┘ snapshot → twist(seq++)
//! └──────────────────┘                      └──────────────┘
//!    ▲        │ connect failed                     │ write failed:
//!    │        ▼                                    │ bye{error}, close
//! ┌──────────────────┐ ◀───────────────────────────┘
//! │ Disconnected     │
//! │ (wait backoff)   │
//! └──────────────────┘
//! ```
//!
//! Every failure path loops back to `Connecting` after a fixed backoff with
//! no growth or jitter: the receiver sits on the same LAN and outages are
//! short. The only permanent exit is [`TelemetryLink::stop`], which sends
//! `bye{app_stopped}` on an open session before closing it.
//!
//! # Cancellation
//!
//! `stop()` raises a shared flag that the thread checks on every tick and
//! while sleeping (sleeps are sliced), then waits a bounded time for the
//! thread to exit. A thread stuck in a blocking connect is detached rather
//! than waited on; it still observes the flag once the connect returns.
//! Each run gets its own state cell and run number, so a detached thread
//! never touches the state or status of a later run.

use super::session::{Session, unix_timestamp};
use super::codec::ByeReason;
use crate::config::SarathiConfig;
use crate::control::SharedControl;
use crate::error::{Result, SarathiError};
use crate::net::Connector;
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Longest uninterrupted sleep; bounds how long a stop request goes unnoticed.
const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Poll interval while waiting for the link thread to exit.
const JOIN_POLL: Duration = Duration::from_millis(5);

/// Timing and identity for the control link.
#[derive(Clone, Debug)]
pub struct LinkSettings {
    pub client_id: String,
    pub send_period: Duration,
    pub reconnect_backoff: Duration,
    pub connect_timeout: Duration,
    pub stop_timeout: Duration,
}

impl LinkSettings {
    pub fn from_config(config: &SarathiConfig) -> Self {
        Self {
            client_id: config.telemetry.client_id.clone(),
            send_period: Duration::from_millis(config.telemetry.send_period_ms),
            reconnect_backoff: Duration::from_millis(config.telemetry.reconnect_backoff_ms),
            connect_timeout: config.connect_timeout(),
            stop_timeout: Duration::from_millis(config.telemetry.stop_timeout_ms),
        }
    }
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self::from_config(&SarathiConfig::default())
    }
}

/// Connection state of the control link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum LinkState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl LinkState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => LinkState::Connecting,
            2 => LinkState::Connected,
            _ => LinkState::Disconnected,
        }
    }
}

/// Status reports emitted by the link thread.
#[derive(Clone, Debug, PartialEq)]
pub enum LinkStatus {
    Connecting { endpoint: String },
    Connected { endpoint: String },
    /// Connect attempt failed; retrying after the backoff
    ConnectFailed { error: String },
    /// Established link lost; reconnecting after the backoff
    Interrupted { error: String },
    /// Link stopped by the operator
    Stopped,
}

/// Handle to the control link thread.
pub struct TelemetryLink {
    connector: Arc<dyn Connector>,
    control: SharedControl,
    settings: LinkSettings,
    /// State of the current run; replaced on every start()
    state: Arc<AtomicU8>,
    /// Number of the current run; bumped on every start()
    run: Arc<AtomicU64>,
    status_tx: Option<Sender<LinkStatus>>,
    /// Shutdown flag of the current run; replaced on every start()
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TelemetryLink {
    pub fn new(connector: Arc<dyn Connector>, control: SharedControl, settings: LinkSettings) -> Self {
        Self {
            connector,
            control,
            settings,
            state: Arc::new(AtomicU8::new(LinkState::Disconnected as u8)),
            run: Arc::new(AtomicU64::new(0)),
            status_tx: None,
            shutdown: Arc::new(AtomicBool::new(true)),
            handle: None,
        }
    }

    /// Report [`LinkStatus`] changes on `tx`.
    pub fn with_status(mut self, tx: Sender<LinkStatus>) -> Self {
        self.status_tx = Some(tx);
        self
    }

    /// Spawn the link thread. Does nothing if it is already running.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            debug!("Control link already running");
            return Ok(());
        }

        // A detached thread from an earlier run keeps its own raised flag and
        // state cell, and stops reporting once the run number moves on.
        self.shutdown = Arc::new(AtomicBool::new(false));
        self.state = Arc::new(AtomicU8::new(LinkState::Disconnected as u8));
        let run_id = self.run.fetch_add(1, Ordering::AcqRel) + 1;

        let worker = LinkWorker {
            connector: Arc::clone(&self.connector),
            control: Arc::clone(&self.control),
            settings: self.settings.clone(),
            state: Arc::clone(&self.state),
            run: Arc::clone(&self.run),
            run_id,
            status_tx: self.status_tx.clone(),
            shutdown: Arc::clone(&self.shutdown),
        };

        let handle = thread::Builder::new()
            .name("control-link".into())
            .spawn(move || worker.run())
            .map_err(|e| SarathiError::ThreadSpawn(format!("control-link: {}", e)))?;
        self.handle = Some(handle);

        info!("Control link started ({})", self.connector.endpoint());
        Ok(())
    }

    /// Stop the link thread and wait up to `stop_timeout` for it to exit.
    ///
    /// Returns `true` if the thread exited within the bound (or was not
    /// running). The link is not restarted until the next [`start`].
    ///
    /// [`start`]: TelemetryLink::start
    pub fn stop(&mut self) -> bool {
        self.shutdown.store(true, Ordering::Release);

        let Some(handle) = self.handle.take() else {
            return true;
        };

        let deadline = Instant::now() + self.settings.stop_timeout;
        while !handle.is_finished() && Instant::now() < deadline {
            thread::sleep(JOIN_POLL);
        }

        if !handle.is_finished() {
            warn!(
                "Control link thread did not exit within {:?}; detaching",
                self.settings.stop_timeout
            );
            return false;
        }

        if handle.join().is_err() {
            error!("Control link thread panicked");
        }
        info!("Control link stopped");
        true
    }

    /// True while the link thread is alive.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn state(&self) -> LinkState {
        LinkState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn endpoint(&self) -> &str {
        self.connector.endpoint()
    }
}

impl Drop for TelemetryLink {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State owned by the link thread.
struct LinkWorker {
    connector: Arc<dyn Connector>,
    control: SharedControl,
    settings: LinkSettings,
    state: Arc<AtomicU8>,
    run: Arc<AtomicU64>,
    run_id: u64,
    status_tx: Option<Sender<LinkStatus>>,
    shutdown: Arc<AtomicBool>,
}

impl LinkWorker {
    fn run(self) {
        let mut session: Option<Session> = None;
        let mut next_tick = Instant::now();

        while !self.should_stop() {
            let Some(active) = session.as_mut() else {
                match self.connect() {
                    Ok(opened) => {
                        session = Some(opened);
                        next_tick = Instant::now();
                    }
                    Err(e) => {
                        self.set_state(LinkState::Disconnected);
                        if matches!(e, SarathiError::Write(_)) {
                            warn!("Control link lost during handshake: {}", e);
                            self.report(LinkStatus::Interrupted {
                                error: e.to_string(),
                            });
                        } else {
                            warn!("Control link connect failed: {}", e);
                            self.report(LinkStatus::ConnectFailed {
                                error: e.to_string(),
                            });
                        }
                        self.sleep_until(Instant::now() + self.settings.reconnect_backoff);
                    }
                }
                continue;
            };

            let control = self.control.snapshot();
            if let Err(e) = active.send_twist(control, unix_timestamp()) {
                warn!("Control link interrupted at seq {}: {}", active.seq(), e);
                if let Some(broken) = session.take() {
                    broken.close(ByeReason::Error);
                }
                self.set_state(LinkState::Disconnected);
                self.report(LinkStatus::Interrupted {
                    error: e.to_string(),
                });
                self.sleep_until(Instant::now() + self.settings.reconnect_backoff);
                continue;
            }

            // Fixed cadence; after an overrun, restart the schedule instead of
            // bursting to catch up.
            next_tick += self.settings.send_period;
            let now = Instant::now();
            if next_tick < now {
                next_tick = now + self.settings.send_period;
            }
            self.sleep_until(next_tick);
        }

        if let Some(open) = session.take() {
            debug!("Sending bye(app_stopped) at seq {}", open.seq());
            open.close(ByeReason::AppStopped);
        }
        self.set_state(LinkState::Disconnected);
        self.report(LinkStatus::Stopped);
        info!("Control link thread exiting");
    }

    fn connect(&self) -> Result<Session> {
        let endpoint = self.connector.endpoint().to_string();
        self.set_state(LinkState::Connecting);
        self.report(LinkStatus::Connecting {
            endpoint: endpoint.clone(),
        });
        debug!("Connecting control link to {}", endpoint);

        let session = Session::open(
            self.connector.as_ref(),
            self.settings.connect_timeout,
            &self.settings.client_id,
        )?;

        self.set_state(LinkState::Connected);
        info!("Control link connected to {}", endpoint);
        self.report(LinkStatus::Connected { endpoint });
        Ok(session)
    }

    /// Sleep until `deadline`, waking early on shutdown.
    fn sleep_until(&self, deadline: Instant) {
        loop {
            if self.should_stop() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }

    fn should_stop(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn set_state(&self, state: LinkState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// False once a later start() has superseded this thread.
    fn is_current(&self) -> bool {
        self.run.load(Ordering::Acquire) == self.run_id
    }

    fn report(&self, status: LinkStatus) {
        if !self.is_current() {
            debug!("Dropping status from superseded link run {}: {:?}", self.run_id, status);
            return;
        }
        if let Some(tx) = &self.status_tx {
            // Nobody listening is fine
            let _ = tx.send(status);
        }
    }
}
