//! Error types for the daemon binary.
//!
//! [`DaemonError`] is the top-level error type that wraps every failure
//! mode during startup and while the mirror runs.

/// Top-level error for the daemon binary.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: hexwatch_core::config::ConfigError,
    },

    /// The observer relay could not start.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying startup error.
        #[from]
        source: hexwatch_observer::StartupError,
    },

    /// The supervisor stopped on a fatal condition.
    #[error("supervisor error: {source}")]
    Supervisor {
        /// The underlying manager error.
        #[from]
        source: hexwatch_core::ManagerError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {message}")]
    Signal {
        /// Description of the signal failure.
        message: String,
    },
}
