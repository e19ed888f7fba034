//! Query layer: read-only projections for external callers.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt as _;
use futures::future::BoxFuture;
use hexwatch_types::{RoomId, RoomObjects, RoomObjectsView, TerrainTile};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::client::StreamClient;
use crate::error::{QueryError, SourceError};
use crate::snapshot::WorldSnapshot;
use crate::source::{ConnectionRole, SourceConnector};

/// Project one room of `snapshot` into a [`RoomObjectsView`].
///
/// Fails with [`QueryError::NotInitialized`] until the snapshot holds
/// entity data. A room with nothing recorded (including a room the
/// snapshot has never heard of) projects to empty collections.
pub fn room_objects(snapshot: &WorldSnapshot, room: RoomId) -> Result<RoomObjectsView, QueryError> {
    let entities = snapshot
        .entities
        .as_deref()
        .ok_or(QueryError::NotInitialized)?;

    let payload = entities
        .get(&room)
        .map(|collections| RoomObjects {
            bots: collections.bots.clone(),
            structures: collections.structures.clone(),
            resources: collections.resources.clone(),
        })
        .unwrap_or_default();

    Ok(RoomObjectsView {
        time: snapshot.world_time,
        room_id: room,
        payload,
    })
}

/// On-demand terrain fetches, independent of the streamed snapshot.
pub trait TerrainLookup: Send + Sync + 'static {
    /// Fetch the terrain of one room.
    fn terrain(&self, room: RoomId) -> BoxFuture<'_, Result<Vec<TerrainTile>, SourceError>>;
}

/// [`TerrainLookup`] over its own source connection.
///
/// The connection is opened lazily on first use, kept for later calls,
/// and dropped after a transport failure so the next call reconnects. It
/// is never the supervisor's streaming connection.
pub struct TerrainClient<C: SourceConnector> {
    connector: Arc<C>,
    request_timeout: Duration,
    client: Mutex<Option<Arc<StreamClient<C::Source>>>>,
}

impl<C: SourceConnector> TerrainClient<C> {
    /// A lookup that connects through `connector` when first asked.
    pub fn new(connector: Arc<C>, request_timeout: Duration) -> Self {
        Self {
            connector,
            request_timeout,
            client: Mutex::new(None),
        }
    }

    async fn client(&self) -> Result<Arc<StreamClient<C::Source>>, SourceError> {
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }

        let source = tokio::time::timeout(
            self.request_timeout,
            self.connector.connect(ConnectionRole::Requests),
        )
        .await
        .map_err(|elapsed| SourceError::Unavailable(format!("connect timed out ({elapsed})")))??;
        info!("Terrain connection opened");
        let client = Arc::new(StreamClient::new(source, self.request_timeout));
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    async fn fetch(&self, room: RoomId) -> Result<Vec<TerrainTile>, SourceError> {
        let client = self.client().await?;
        let result = client.fetch_terrain(room).await;
        if let Err(SourceError::Unavailable(ref reason)) = result {
            let mut slot = self.client.lock().await;
            if slot.as_ref().is_some_and(|cached| Arc::ptr_eq(cached, &client)) {
                debug!(%room, reason = %reason, "Dropping terrain connection");
                *slot = None;
            }
        }
        result
    }
}

impl<C: SourceConnector> TerrainLookup for TerrainClient<C> {
    fn terrain(&self, room: RoomId) -> BoxFuture<'_, Result<Vec<TerrainTile>, SourceError>> {
        self.fetch(room).boxed()
    }
}
