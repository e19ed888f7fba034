//! Response-shaped projections produced on demand by the query layer.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::entities::{Bot, Resource, Structure};
use crate::ids::RoomId;

/// The entities of one room.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RoomObjects {
    /// Bots in the room.
    pub bots: Vec<Bot>,
    /// Structures in the room.
    pub structures: Vec<Structure>,
    /// Resources in the room.
    pub resources: Vec<Resource>,
}

/// One room's entities as of a world time.
///
/// A value, never stored: it is rebuilt from the current snapshot on
/// every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct RoomObjectsView {
    /// World time of the snapshot the view was taken from.
    pub time: i64,
    /// The room the view describes.
    #[ts(type = "string")]
    pub room_id: RoomId,
    /// The room's entities.
    pub payload: RoomObjects,
}
