//! Daemon binary for the Hexwatch world-state mirror.
//!
//! Wires the NATS world source into a [`StateManager`] and serves the
//! mirrored world through the observer relay until Ctrl-C or a fatal
//! supervisor error.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `hexwatch-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Start the state manager over a NATS connector
//! 4. Spawn the observer relay
//! 5. Wait for Ctrl-C or a fatal supervisor stop
//! 6. Shut down

mod error;

use std::path::Path;
use std::sync::Arc;

use hexwatch_core::config::{HexwatchConfig, LogFormat, LoggingConfig};
use hexwatch_core::{ManagerError, StateManager, SyncSettings};
use hexwatch_nats::NatsConnector;
use hexwatch_observer::{AppState, ServerConfig, spawn_observer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::DaemonError;

const CONFIG_PATH: &str = "hexwatch-config.yaml";

/// Why the daemon is stopping.
enum Stop {
    Signal(std::io::Result<()>),
    Supervisor(Result<(), ManagerError>),
}

/// Application entry point for the daemon.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the observer port cannot
/// be bound, or the supervisor stops on a fatal condition.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, from_file) = load_config(Path::new(CONFIG_PATH))?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("hexwatch-daemon starting");
    if from_file {
        info!(path = CONFIG_PATH, "Configuration loaded");
    } else {
        info!("Config file not found, using defaults");
    }
    info!(
        source_url = %config.source.url,
        request_timeout_ms = config.source.request_timeout_ms,
        backoff_base_ms = config.backoff.base_ms,
        backoff_max_ms = config.backoff.max_ms,
        max_retries = ?config.backoff.max_retries,
        "Sync settings"
    );

    // 3. Start the state manager.
    let connector = NatsConnector::from_config(&config.source);
    let mut manager = StateManager::start(connector, &SyncSettings::from_config(&config));

    // 4. Spawn the observer relay.
    let state = Arc::new(AppState::new(manager.world()));
    let observer = spawn_observer(&ServerConfig::from(&config.observer), state)
        .await
        .map_err(DaemonError::from)?;
    info!(addr = %observer.addr, "Observer relay ready");

    // 5. Run until Ctrl-C or a fatal supervisor stop.
    let stop = tokio::select! {
        signal = tokio::signal::ctrl_c() => Stop::Signal(signal),
        stopped = manager.stopped() => Stop::Supervisor(stopped),
    };

    // 6. Shut down.
    let result = match stop {
        Stop::Signal(signal) => {
            if let Err(e) = &signal {
                warn!(error = %e, "Failed to listen for Ctrl-C, shutting down");
            } else {
                info!("Shutdown requested");
            }
            let stopped = manager.shutdown().await;
            signal
                .map_err(|e| DaemonError::Signal {
                    message: e.to_string(),
                })
                .and(stopped.map_err(DaemonError::from))
        }
        Stop::Supervisor(stopped) => {
            if let Err(e) = &stopped {
                error!(error = %e, "Supervisor stopped");
            }
            stopped.map_err(DaemonError::from)
        }
    };
    observer.task.abort();
    info!("hexwatch-daemon stopped");

    result?;
    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level when set.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    match config.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init(),
    }
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist. Environment overrides and validation apply either way.
///
/// The flag reports whether the file was read.
fn load_config(path: &Path) -> Result<(HexwatchConfig, bool), DaemonError> {
    if path.exists() {
        Ok((HexwatchConfig::from_file(path)?, true))
    } else {
        Ok((HexwatchConfig::parse("")?, false))
    }
}
