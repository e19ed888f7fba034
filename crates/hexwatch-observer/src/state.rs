//! Shared application state for the observer relay.
//!
//! [`AppState`] wraps the [`WorldState`] read handle and a broadcast
//! channel. A subscriber registered on the world's registry relays every
//! published snapshot into the channel, and each `WebSocket` client holds
//! its own receiver.

use std::sync::Arc;

use hexwatch_core::registry::SubscriptionId;
use hexwatch_core::{SubscriberError, WorldSnapshot, WorldState};
use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the snapshot broadcast channel.
///
/// A client that falls further behind receives a
/// [`broadcast::error::RecvError::Lagged`] and jumps to the newest
/// snapshot.
const BROADCAST_CAPACITY: usize = 64;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor. Dropping
/// the last reference removes the relay subscriber from the registry.
pub struct AppState {
    /// Read handle on the mirrored world.
    pub world: WorldState,
    tx: broadcast::Sender<Arc<WorldSnapshot>>,
    relay: SubscriptionId,
}

impl AppState {
    /// Attach a relay to `world`.
    pub fn new(world: WorldState) -> Self {
        Self::with_capacity(world, BROADCAST_CAPACITY)
    }

    /// Attach a relay that buffers at most `capacity` snapshots per
    /// client (at least one).
    pub fn with_capacity(world: WorldState, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        let sender = tx.clone();
        let relay = world.register(
            move |snapshot: &Arc<WorldSnapshot>| -> Result<(), SubscriberError> {
                // Zero receivers is the normal idle case.
                let receivers = sender.send(Arc::clone(snapshot)).unwrap_or(0);
                debug!(
                    world_time = snapshot.world_time,
                    receivers, "Relayed snapshot"
                );
                Ok(())
            },
        );
        Self { world, tx, relay }
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<WorldSnapshot>> {
        self.tx.subscribe()
    }

    /// Number of connected stream clients.
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("world", &self.world)
            .field("relay", &self.relay)
            .field("clients", &self.client_count())
            .finish()
    }
}

impl Drop for AppState {
    fn drop(&mut self) {
        self.world.deregister(self.relay);
    }
}
