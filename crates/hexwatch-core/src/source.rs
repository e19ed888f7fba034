//! The transport boundary with the world source.
//!
//! [`WorldSource`] is the raw wire contract: the four operations the
//! source offers, returning protocol messages unvalidated. The
//! [`StreamClient`](crate::client::StreamClient) layers validation and
//! per-request deadlines on top of it. [`SourceConnector`] opens fresh
//! connections so that each supervisor session owns its connection
//! exclusively and point requests use one of their own.
//!
//! Implementations: `hexwatch-nats` talks to a live source over NATS;
//! [`ScriptedConnector`](crate::scripted::ScriptedConnector) plays back
//! canned sessions in tests.

use std::future::Future;

use futures::Stream;
use hexwatch_types::{Axial, EntitiesMessage, RoomLayoutReply, RoomListReply, TerrainReply};

use crate::error::SourceError;

/// What a connection will be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    /// Bootstrap plus the long-lived entity subscription.
    Stream,
    /// Point requests (terrain) served to readers.
    Requests,
}

/// One open connection to the world source.
pub trait WorldSource: Send + Sync + 'static {
    /// The entity subscription. Ordered, unbounded, not restartable.
    type Updates: Stream<Item = Result<EntitiesMessage, SourceError>> + Send + Unpin + 'static;

    /// `ListRooms`.
    fn list_rooms(&self) -> impl Future<Output = Result<RoomListReply, SourceError>> + Send;

    /// `GetRoomLayout`.
    fn room_layout(&self) -> impl Future<Output = Result<RoomLayoutReply, SourceError>> + Send;

    /// `GetRoomTerrain`. Fails with [`SourceError::RoomNotFound`] for
    /// rooms the source does not know.
    fn room_terrain(
        &self,
        room: Axial,
    ) -> impl Future<Output = Result<TerrainReply, SourceError>> + Send;

    /// `SubscribeEntities`. The returned stream ends when the connection
    /// closes.
    fn subscribe_entities(
        &self,
    ) -> impl Future<Output = Result<Self::Updates, SourceError>> + Send;
}

/// Opens connections to the world source.
pub trait SourceConnector: Send + Sync + 'static {
    /// The connection type produced.
    type Source: WorldSource;

    /// Open a new connection for the given role.
    fn connect(
        &self,
        role: ConnectionRole,
    ) -> impl Future<Output = Result<Self::Source, SourceError>> + Send;
}
