//! Sarathi - terminal teleoperation client
//!
//! Reads operator commands from stdin, keeps the control link streaming in
//! the background and uploads recorded takes on request. Ctrl-C or `quit`
//! sends `bye` and exits.

use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use sarathi::console::{OperatorCommand, USAGE};
use sarathi::telemetry::LinkStatus;
use sarathi::{Operator, Reply, Result, SarathiConfig, SarathiError};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

const DEFAULT_CONFIG: &str = "sarathi.toml";

/// Teleoperation client for the remote teleop receiver
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path (default: ./sarathi.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the receiver host
    #[arg(long)]
    host: Option<String>,

    /// Override the client id sent in the handshake
    #[arg(long)]
    client_id: Option<String>,
}

fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(
        "sarathi=info"
            .parse()
            .map_err(|e| SarathiError::Config(format!("log filter: {}", e)))?,
    );
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = load_config(&args)?;

    info!("Sarathi v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Control {} | audio {} | client id {}",
        config.control_address(),
        config.audio_address(),
        config.telemetry.client_id
    );
    if config.audio.capture_command.is_empty() {
        warn!("No capture_command configured; recording is disabled");
    }

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || r.store(false, Ordering::SeqCst))
        .map_err(|e| SarathiError::Config(format!("Ctrl-C handler: {}", e)))?;

    let lines = spawn_stdin_reader()?;

    let mut operator = Operator::from_config(&config);
    operator.start()?;
    println!("{}", USAGE);

    while running.load(Ordering::SeqCst) {
        for status in operator.link_events().try_iter() {
            print_link_status(&status);
        }
        if let Some(outcome) = operator.poll_transfer() {
            println!("upload: {:?}", outcome);
        }

        let line = match lines.recv_timeout(Duration::from_millis(100)) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                info!("stdin closed");
                break;
            }
        };

        let cmd = match OperatorCommand::parse(&line) {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(e) => {
                println!("{} ({})", e, USAGE);
                continue;
            }
        };

        match operator.handle(cmd) {
            Ok(Reply::Silent) => {}
            Ok(Reply::Text(text)) => println!("{}", text),
            Ok(Reply::Quit) => break,
            Err(e) => {
                error!("{}", e);
                println!("error: {}", e);
            }
        }
    }

    info!("Shutting down...");
    operator.shutdown();
    for status in operator.link_events().try_iter() {
        print_link_status(&status);
    }
    info!("Sarathi finished");
    Ok(())
}

/// Explicit `--config`, else `sarathi.toml` if present, else defaults; then
/// command line overrides.
fn load_config(args: &Args) -> Result<SarathiConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            SarathiConfig::load(path)?
        }
        None if Path::new(DEFAULT_CONFIG).exists() => {
            info!("Loading configuration from {}", DEFAULT_CONFIG);
            SarathiConfig::load(Path::new(DEFAULT_CONFIG))?
        }
        None => {
            info!("Using default configuration");
            SarathiConfig::default()
        }
    };

    if let Some(host) = &args.host {
        config.connection.server_host = host.clone();
    }
    if let Some(id) = &args.client_id {
        config.telemetry.client_id = id.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Forward stdin lines over a channel so the main loop can also watch the
/// running flag. The thread is left blocked in read at exit.
fn spawn_stdin_reader() -> Result<crossbeam_channel::Receiver<String>> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .map_err(|e| SarathiError::ThreadSpawn(format!("stdin: {}", e)))?;
    Ok(rx)
}

/// Echo link transitions to the operator; the link thread already logs them.
fn print_link_status(status: &LinkStatus) {
    match status {
        LinkStatus::Connecting { .. } => {}
        LinkStatus::Connected { endpoint } => println!("link: up ({})", endpoint),
        LinkStatus::ConnectFailed { error } => println!("link: {}, retrying", error),
        LinkStatus::Interrupted { error } => println!("link: lost ({}), reconnecting", error),
        LinkStatus::Stopped => println!("link: stopped"),
    }
}
