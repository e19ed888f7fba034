//! Observer startup helper for embedding in the daemon.
//!
//! [`spawn_observer`] binds the port up front, so a taken port fails the
//! daemon at startup, then runs the server on a background Tokio task.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{self, ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the observer server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// A running observer server.
#[derive(Debug)]
pub struct ObserverHandle {
    /// The address actually bound.
    pub addr: SocketAddr,
    /// The background server task.
    pub task: JoinHandle<()>,
}

/// Bind the observer port and serve on a background task.
///
/// The server runs until the Tokio runtime is shut down or the task is
/// aborted.
pub async fn spawn_observer(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<ObserverHandle, StartupError> {
    let listener = server::bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;

    let task = tokio::spawn(async move {
        if let Err(e) = server::serve(listener, state).await {
            tracing::error!(error = %e, "Observer server exited with error");
        }
    });

    tracing::info!(%addr, "Observer server spawned on background task");

    Ok(ObserverHandle { addr, task })
}
