//! The owning handle: starts the supervisor and exposes the world to
//! readers.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hexwatch_types::{RoomId, RoomObjectsView, TerrainTile};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backoff::BackoffPolicy;
use crate::config::HexwatchConfig;
use crate::error::{FatalError, ManagerError, QueryError};
use crate::query::{self, TerrainClient, TerrainLookup};
use crate::registry::{Subscriber, SubscriberRegistry, SubscriptionId};
use crate::snapshot::WorldSnapshot;
use crate::source::SourceConnector;
use crate::store::SnapshotStore;
use crate::supervisor::{CounterSnapshot, Supervisor, SupervisorPhase, SyncCounters};

/// Supervisor settings taken from configuration at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    /// Reconnect backoff.
    pub policy: BackoffPolicy,
    /// Deadline for each point request and for opening the subscription.
    pub request_timeout: Duration,
}

impl SyncSettings {
    /// Settings from a validated [`HexwatchConfig`].
    pub const fn from_config(config: &HexwatchConfig) -> Self {
        Self {
            policy: BackoffPolicy::from_config(&config.backoff),
            request_timeout: config.source.request_timeout(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&HexwatchConfig::default())
    }
}

struct WorldInner {
    store: SnapshotStore,
    registry: SubscriberRegistry,
    counters: SyncCounters,
    phase: watch::Receiver<SupervisorPhase>,
    terrain: Arc<dyn TerrainLookup>,
}

/// Cheap, cloneable read handle on the mirrored world.
///
/// Every method is safe to call from any number of tasks at once and none
/// waits on the supervisor.
#[derive(Clone)]
pub struct WorldState {
    inner: Arc<WorldInner>,
}

impl fmt::Debug for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldState")
            .field("phase", &self.phase())
            .field("world_time", &self.current().map(|s| s.world_time))
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}

impl WorldState {
    fn new(phase: watch::Receiver<SupervisorPhase>, terrain: Arc<dyn TerrainLookup>) -> Self {
        Self {
            inner: Arc::new(WorldInner {
                store: SnapshotStore::new(),
                registry: SubscriberRegistry::new(),
                counters: SyncCounters::default(),
                phase,
                terrain,
            }),
        }
    }

    /// The latest published snapshot, if a session has bootstrapped.
    pub fn current(&self) -> Option<Arc<WorldSnapshot>> {
        self.inner.store.load()
    }

    /// `getRoomObjects` against the latest snapshot.
    pub fn room_objects(&self, room: RoomId) -> Result<RoomObjectsView, QueryError> {
        let snapshot = self.current().ok_or(QueryError::NotInitialized)?;
        query::room_objects(&snapshot, room)
    }

    /// `getTerrain`: fetched from the source, not from the snapshot.
    pub async fn terrain(&self, room: RoomId) -> Result<Vec<TerrainTile>, QueryError> {
        Ok(self.inner.terrain.terrain(room).await?)
    }

    /// Register for every snapshot published from now on.
    pub fn register(&self, subscriber: impl Subscriber) -> SubscriptionId {
        self.inner.registry.register(subscriber)
    }

    /// Stop notifying a subscriber. Unknown ids are ignored.
    pub fn deregister(&self, id: SubscriptionId) -> bool {
        self.inner.registry.deregister(id)
    }

    /// The subscriber registry.
    pub fn registry(&self) -> &SubscriberRegistry {
        &self.inner.registry
    }

    /// Current supervisor phase.
    pub fn phase(&self) -> SupervisorPhase {
        *self.inner.phase.borrow()
    }

    /// A receiver that observes phase changes.
    pub fn watch_phase(&self) -> watch::Receiver<SupervisorPhase> {
        self.inner.phase.clone()
    }

    /// Supervisor counters.
    pub fn counters(&self) -> CounterSnapshot {
        self.inner.counters.snapshot()
    }

    pub(crate) fn store_ref(&self) -> &SnapshotStore {
        &self.inner.store
    }

    pub(crate) fn counters_ref(&self) -> &SyncCounters {
        &self.inner.counters
    }
}

/// Owns the supervisor task for one mirrored world.
///
/// Dropping the manager stops the supervisor as well.
pub struct StateManager {
    world: WorldState,
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<Result<(), FatalError>>>,
}

impl fmt::Debug for StateManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateManager")
            .field("world", &self.world)
            .field("running", &self.task.is_some())
            .finish()
    }
}

impl StateManager {
    /// Spawn the supervisor on the current Tokio runtime.
    pub fn start<C: SourceConnector>(connector: C, settings: &SyncSettings) -> Self {
        let connector = Arc::new(connector);
        let (phase_tx, phase_rx) = watch::channel(SupervisorPhase::Idle);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let terrain = TerrainClient::new(Arc::clone(&connector), settings.request_timeout);
        let world = WorldState::new(phase_rx, Arc::new(terrain));

        let supervisor = Supervisor::new(
            connector,
            settings.policy,
            settings.request_timeout,
            world.clone(),
            phase_tx,
        );
        let task = tokio::spawn(supervisor.run(shutdown_rx));
        info!("State manager started");

        Self {
            world,
            shutdown: shutdown_tx,
            task: Some(task),
        }
    }

    /// A read handle on the mirrored world.
    pub fn world(&self) -> WorldState {
        self.world.clone()
    }

    /// Wait for the supervisor to stop and report why.
    ///
    /// Cancel-safe. Once the outcome has been reported, later calls return
    /// `Ok(())` immediately.
    pub async fn stopped(&mut self) -> Result<(), ManagerError> {
        let Some(task) = self.task.as_mut() else {
            return Ok(());
        };
        let joined = task.await;
        self.task = None;
        match joined {
            Ok(Ok(())) => Ok(()),
            Ok(Err(fatal)) => Err(ManagerError::Fatal { source: fatal }),
            Err(e) => {
                warn!(error = %e, "Supervisor task did not finish cleanly");
                Err(ManagerError::Task {
                    message: e.to_string(),
                })
            }
        }
    }

    /// Ask the supervisor to stop and wait until it has.
    ///
    /// A pending request or backoff wait is abandoned; the published
    /// snapshot stays whatever it was.
    pub async fn shutdown(mut self) -> Result<(), ManagerError> {
        self.shutdown.send_replace(true);
        self.stopped().await
    }
}
