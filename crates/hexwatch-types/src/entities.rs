//! Entity records, terrain tiles, and diagnostics as emitted by the source.
//!
//! These are plain data carried through the mirror untouched: the mirror
//! never interprets bot, structure, or resource fields, it only files them
//! under the room they were reported for.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::ids::Axial;

/// A fully qualified position: the room and the tile inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct WorldPosition {
    /// Room the entity is in.
    pub room: Axial,
    /// Tile inside the room.
    pub pos: Axial,
}

/// A scripted unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Bot {
    /// Source-assigned entity id.
    pub id: u64,
    /// Where the bot stands.
    pub position: WorldPosition,
    /// Owning user, if any.
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    /// Script driving the bot, if any.
    #[serde(default)]
    pub script_id: Option<Uuid>,
    /// Carried resource amount.
    #[serde(default)]
    pub carry: u32,
    /// Carry capacity.
    #[serde(default)]
    pub carry_max: u32,
    /// Current hit points.
    #[serde(default)]
    pub hp: u32,
    /// Maximum hit points.
    #[serde(default)]
    pub hp_max: u32,
}

/// Kinds of structures the source reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum StructureKind {
    /// Produces new bots.
    Spawn,
    /// Any kind this build does not know yet.
    #[serde(other)]
    Unknown,
}

/// A static, owned building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Structure {
    /// Source-assigned entity id.
    pub id: u64,
    /// Where the structure stands.
    pub position: WorldPosition,
    /// Structure kind.
    pub kind: StructureKind,
    /// Owning user, if any.
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    /// Current hit points.
    #[serde(default)]
    pub hp: u32,
    /// Maximum hit points.
    #[serde(default)]
    pub hp_max: u32,
    /// Stored energy.
    #[serde(default)]
    pub energy: u32,
    /// Energy capacity.
    #[serde(default)]
    pub energy_max: u32,
}

/// Kinds of harvestable resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum ResourceKind {
    /// Harvestable energy.
    Energy,
    /// Any kind this build does not know yet.
    #[serde(other)]
    Unknown,
}

/// A harvestable resource node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Resource {
    /// Source-assigned entity id.
    pub id: u64,
    /// Where the resource lies.
    pub position: WorldPosition,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Remaining amount.
    #[serde(default)]
    pub amount: u32,
    /// Amount when full.
    #[serde(default)]
    pub amount_max: u32,
}

/// Terrain type of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub enum TerrainKind {
    /// Outside the playable area.
    Empty,
    /// Walkable ground.
    Plain,
    /// Impassable.
    Wall,
    /// Connects a room to its neighbour.
    Bridge,
}

/// One tile of a room's static terrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct TerrainTile {
    /// Tile position inside the room.
    pub position: Axial,
    /// Terrain at that position.
    pub terrain: TerrainKind,
}

/// Where a room is drawn in the world layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RoomPosition {
    /// Horizontal offset of the room centre.
    pub x: f32,
    /// Vertical offset of the room centre.
    pub y: f32,
}

/// Health metadata the source attaches to some ticks.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase", default)]
#[ts(export, export_to = "bindings/")]
pub struct SourceDiagnostics {
    /// Wall time the source spent on the tick.
    pub tick_latency_ms: f64,
    /// Scripts executed during the tick.
    pub scripts_run: u64,
    /// Scripts that errored during the tick.
    pub scripts_failed: u64,
    /// Intents produced by scripts during the tick.
    pub intents: u64,
    /// Live entities at the end of the tick.
    pub entities: u64,
}
