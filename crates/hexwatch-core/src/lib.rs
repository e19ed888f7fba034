//! Streaming world-state synchronization for the Hexwatch mirror.
//!
//! A background supervisor connects to the world source, bootstraps the
//! room topology, subscribes to per-tick entity updates and folds each one
//! into a new immutable [`WorldSnapshot`]. Readers load the latest snapshot
//! in one atomic step; subscribers are pushed every new version.
//!
//! # Modules
//!
//! - [`source`] -- The [`WorldSource`] / [`SourceConnector`] transport seam.
//! - [`client`] -- Validating, deadline-bounded stream client.
//! - [`aggregator`] -- Pure snapshot construction from updates.
//! - [`supervisor`] -- Bootstrap/stream/backoff state machine.
//! - [`backoff`] -- Capped exponential backoff with jitter.
//! - [`registry`] -- Copy-on-write subscriber registry.
//! - [`query`] -- Room object projection and terrain lookup.
//! - [`manager`] -- [`StateManager`] and the [`WorldState`] read handle.
//! - [`config`] -- `hexwatch-config.yaml` loading.
//! - [`scripted`] -- In-memory scripted source for tests.
//!
//! [`WorldSource`]: source::WorldSource
//! [`SourceConnector`]: source::SourceConnector
//! [`StateManager`]: manager::StateManager
//! [`WorldState`]: manager::WorldState

pub mod aggregator;
pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
pub mod manager;
pub mod query;
pub mod registry;
pub mod scripted;
pub mod snapshot;
pub mod source;
pub mod store;
pub mod supervisor;

pub use error::{FatalError, ManagerError, QueryError, SourceError, SubscriberError};
pub use manager::{StateManager, SyncSettings, WorldState};
pub use snapshot::WorldSnapshot;
pub use supervisor::{CounterSnapshot, SupervisorPhase};
