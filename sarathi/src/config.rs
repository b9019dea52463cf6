//! Configuration loading for Sarathi
//!
//! Every option has a default matching the stock LAN deployment, so an empty
//! (or missing) `sarathi.toml` is a valid configuration.
//!
//! ```toml
//! [connection]
//! server_host = "192.168.1.33"
//! control_port = 2053
//! audio_port = 2052
//!
//! [telemetry]
//! send_period_ms = 100
//!
//! [limits]
//! max_linear_mps = 0.5
//! max_angular_dps = 15.0
//!
//! [audio]
//! capture_command = ["arecord", "-q", "-t", "raw", "-f", "S16_LE", "-r", "16000", "-c", "1"]
//! ```

use crate::error::{Result, SarathiError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Main configuration structure
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SarathiConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

/// Remote endpoint settings
#[derive(Clone, Debug, Deserialize)]
pub struct ConnectionConfig {
    /// Host running the teleop receiver (default: 192.168.1.33)
    #[serde(default = "default_server_host")]
    pub server_host: String,

    /// Control link TCP port (default: 2053)
    #[serde(default = "default_control_port")]
    pub control_port: u16,

    /// Audio upload TCP port (default: 2052)
    #[serde(default = "default_audio_port")]
    pub audio_port: u16,

    /// Connect timeout in milliseconds, shared by both links (default: 3000)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
}

/// Control link cadence and lifecycle
#[derive(Clone, Debug, Deserialize)]
pub struct TelemetryConfig {
    /// Twist period in milliseconds (default: 100, i.e. 10Hz)
    #[serde(default = "default_send_period")]
    pub send_period_ms: u64,

    /// Fixed wait between reconnect attempts (default: 1000)
    #[serde(default = "default_reconnect_backoff")]
    pub reconnect_backoff_ms: u64,

    /// How long stop() waits for the link thread to exit (default: 1500)
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_ms: u64,

    /// Identifier sent in the hello handshake
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

/// Joystick scaling limits
#[derive(Clone, Debug, Deserialize)]
pub struct LimitsConfig {
    /// Full-deflection linear velocity for vx/vy/vz in m/s (default: 0.5)
    #[serde(default = "default_max_linear")]
    pub max_linear_mps: f32,

    /// Full-deflection angular rate for roll/pitch/yaw in deg/s (default: 15.0)
    #[serde(default = "default_max_angular")]
    pub max_angular_dps: f32,
}

/// Microphone capture settings
#[derive(Clone, Debug, Deserialize)]
pub struct AudioConfig {
    /// Bytes requested per blocking read (default: 640 = 20ms of 16kHz S16 mono)
    #[serde(default = "default_frame_bytes")]
    pub frame_bytes: usize,

    /// Bounded join for the sampling thread in milliseconds (default: 1000)
    #[serde(default = "default_capture_stop_timeout")]
    pub capture_stop_timeout_ms: u64,

    /// Program producing raw PCM on stdout. Empty means no microphone access.
    #[serde(default)]
    pub capture_command: Vec<String>,
}

// Default value functions
fn default_server_host() -> String {
    "192.168.1.33".to_string()
}
fn default_control_port() -> u16 {
    2053
}
fn default_audio_port() -> u16 {
    2052
}
fn default_connect_timeout() -> u64 {
    3000
}
fn default_send_period() -> u64 {
    100
}
fn default_reconnect_backoff() -> u64 {
    1000
}
fn default_stop_timeout() -> u64 {
    1500
}
fn default_client_id() -> String {
    format!("{}-{}", env!("CARGO_PKG_NAME"), std::env::consts::OS)
}
fn default_max_linear() -> f32 {
    0.5
}
fn default_max_angular() -> f32 {
    15.0
}
fn default_frame_bytes() -> usize {
    640
}
fn default_capture_stop_timeout() -> u64 {
    1000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            control_port: default_control_port(),
            audio_port: default_audio_port(),
            connect_timeout_ms: default_connect_timeout(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            send_period_ms: default_send_period(),
            reconnect_backoff_ms: default_reconnect_backoff(),
            stop_timeout_ms: default_stop_timeout(),
            client_id: default_client_id(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_linear_mps: default_max_linear(),
            max_angular_dps: default_max_angular(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            frame_bytes: default_frame_bytes(),
            capture_stop_timeout_ms: default_capture_stop_timeout(),
            capture_command: Vec::new(),
        }
    }
}

impl SarathiConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SarathiError::Config(format!("Failed to read config file: {}", e)))?;
        let config: SarathiConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the link and capture loops cannot run with.
    pub fn validate(&self) -> Result<()> {
        let c = &self.connection;
        if c.server_host.trim().is_empty() {
            return Err(SarathiError::Config("server_host is empty".into()));
        }
        if c.control_port == 0 || c.audio_port == 0 {
            return Err(SarathiError::Config("ports must be non-zero".into()));
        }

        let durations = [
            ("connect_timeout_ms", c.connect_timeout_ms),
            ("send_period_ms", self.telemetry.send_period_ms),
            ("reconnect_backoff_ms", self.telemetry.reconnect_backoff_ms),
            ("stop_timeout_ms", self.telemetry.stop_timeout_ms),
            ("capture_stop_timeout_ms", self.audio.capture_stop_timeout_ms),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, ms)| *ms == 0) {
            return Err(SarathiError::Config(format!("{} must be non-zero", name)));
        }

        for (name, limit) in [
            ("max_linear_mps", self.limits.max_linear_mps),
            ("max_angular_dps", self.limits.max_angular_dps),
        ] {
            if !limit.is_finite() || limit <= 0.0 {
                return Err(SarathiError::Config(format!(
                    "{} must be finite and positive, got {}",
                    name, limit
                )));
            }
        }

        // S16 samples are two bytes; odd reads would split a sample across frames
        if self.audio.frame_bytes == 0 || self.audio.frame_bytes % 2 != 0 {
            return Err(SarathiError::Config(format!(
                "frame_bytes must be a non-zero multiple of 2, got {}",
                self.audio.frame_bytes
            )));
        }

        Ok(())
    }

    /// Control link address (`host:port`)
    pub fn control_address(&self) -> String {
        format!(
            "{}:{}",
            self.connection.server_host, self.connection.control_port
        )
    }

    /// Audio upload address (`host:port`)
    pub fn audio_address(&self) -> String {
        format!("{}:{}", self.connection.server_host, self.connection.audio_port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.connect_timeout_ms)
    }
}
