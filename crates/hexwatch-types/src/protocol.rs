//! JSON messages exchanged with the world source.
//!
//! Point requests (room list, layout, terrain) are answered with a
//! [`Reply`] envelope so that a "not found" or "permission denied"
//! outcome can be told apart from a transport failure. The entity
//! subscription carries bare [`EntitiesMessage`] payloads, one per tick.

use serde::{Deserialize, Serialize};

use crate::entities::{Bot, Resource, RoomPosition, SourceDiagnostics, Structure, TerrainTile};
use crate::ids::Axial;

/// Error codes the source may put in an error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The requested object does not exist.
    NotFound,
    /// The caller is not allowed to talk to the source.
    PermissionDenied,
    /// The request was malformed.
    InvalidArgument,
    /// The source is temporarily unable to answer.
    Unavailable,
    /// The source failed internally.
    Internal,
}

/// Envelope around every point-request reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply<T> {
    /// The request succeeded.
    Ok {
        /// Reply payload.
        body: T,
    },
    /// The request failed on the source side.
    Error {
        /// Machine-readable failure class.
        code: ErrorCode,
        /// Human-readable detail.
        #[serde(default)]
        message: String,
    },
}

/// Reply to `ListRooms`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListReply {
    /// Every room of the world.
    pub room_ids: Vec<Axial>,
}

/// One room's place in the world layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPlacement {
    /// The room being placed.
    pub room_id: Axial,
    /// Where it is drawn.
    pub position: RoomPosition,
}

/// Reply to `GetRoomLayout`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomLayoutReply {
    /// Placement of every room that has one.
    pub positions: Vec<RoomPlacement>,
}

/// Reply to `GetRoomTerrain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainReply {
    /// The room the tiles belong to.
    pub room_id: Axial,
    /// Every tile of the room.
    #[serde(default)]
    pub tiles: Vec<TerrainTile>,
}

/// Bots of one room within an [`EntitiesMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomBots {
    /// Room the bots are in.
    pub room_id: Axial,
    /// The bots.
    #[serde(default)]
    pub bots: Vec<Bot>,
}

/// Structures of one room within an [`EntitiesMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStructures {
    /// Room the structures are in.
    pub room_id: Axial,
    /// The structures.
    #[serde(default)]
    pub structures: Vec<Structure>,
}

/// Resources of one room within an [`EntitiesMessage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomResources {
    /// Room the resources are in.
    pub room_id: Axial,
    /// The resources.
    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// One tick of the entity subscription.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitiesMessage {
    /// The source's logical clock after the tick.
    pub world_time: u64,
    /// Per-room bots touched this tick.
    #[serde(default)]
    pub bots: Vec<RoomBots>,
    /// Per-room structures touched this tick.
    #[serde(default)]
    pub structures: Vec<RoomStructures>,
    /// Per-room resources touched this tick.
    #[serde(default)]
    pub resources: Vec<RoomResources>,
    /// Source health metadata, when sent.
    #[serde(default)]
    pub diagnostics: Option<SourceDiagnostics>,
}
