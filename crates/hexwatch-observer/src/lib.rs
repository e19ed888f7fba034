//! Observer relay for the Hexwatch world-state mirror.
//!
//! A thin Axum HTTP + `WebSocket` layer over the query layer and the
//! subscriber registry of [`hexwatch_core`].
//!
//! # Modules
//!
//! - [`router`] -- Axum router construction with CORS and tracing.
//! - [`handlers`] -- REST endpoint handlers.
//! - [`ws`] -- `WebSocket` room object stream.
//! - [`state`] -- Shared state and the snapshot broadcast relay.
//! - [`error`] -- Error types with HTTP response conversion.
//! - [`server`] -- Server binding and serving.
//! - [`startup`] -- Background task spawn helper for the daemon.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError};
pub use startup::{ObserverHandle, StartupError, spawn_observer};
pub use state::AppState;
