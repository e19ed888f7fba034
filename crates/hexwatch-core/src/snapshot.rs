//! The unit of published state.
//!
//! A [`WorldSnapshot`] is immutable once built. The supervisor publishes
//! snapshots behind an [`Arc`]; readers that hold one keep a
//! self-consistent view no matter how many newer versions are published
//! after it. Per-room collections are themselves reference-counted so a
//! new version shares every room the update did not touch.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hexwatch_types::{Bot, Resource, RoomId, RoomPosition, SourceDiagnostics, Structure};

/// `worldTime` of a snapshot that has not seen any update yet.
pub const UNINITIALIZED_WORLD_TIME: i64 = -1;

/// Room identifier to layout position.
pub type RoomLayout = BTreeMap<RoomId, RoomPosition>;

/// Room identifier to that room's entities.
pub type EntityMap = BTreeMap<RoomId, Arc<RoomEntities>>;

/// The three entity collections of one room.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoomEntities {
    /// Bots in the room.
    pub bots: Vec<Bot>,
    /// Structures in the room.
    pub structures: Vec<Structure>,
    /// Resources in the room.
    pub resources: Vec<Resource>,
}

/// The static shape of the world for one stream session.
///
/// Fetched at bootstrap and shared, unchanged, by every snapshot of the
/// session.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Topology {
    rooms: Vec<RoomId>,
    layout: RoomLayout,
    index: BTreeSet<RoomId>,
}

impl Topology {
    /// Build a topology from the source's room list and layout.
    pub fn new(rooms: Vec<RoomId>, layout: RoomLayout) -> Self {
        let index = rooms.iter().copied().collect();
        Self {
            rooms,
            layout,
            index,
        }
    }

    /// Rooms in the order the source listed them.
    pub fn rooms(&self) -> &[RoomId] {
        &self.rooms
    }

    /// Spatial layout of the rooms.
    pub const fn layout(&self) -> &RoomLayout {
        &self.layout
    }

    /// Whether the source declared this room at bootstrap.
    pub fn contains(&self, room: RoomId) -> bool {
        self.index.contains(&room)
    }
}

/// The world as of one `worldTime`.
#[derive(Debug, Clone)]
pub struct WorldSnapshot {
    /// Source tick this snapshot reflects; [`UNINITIALIZED_WORLD_TIME`]
    /// until the first update.
    pub world_time: i64,
    /// When this version was assembled locally.
    pub observed_at: DateTime<Utc>,
    /// Per-room entities; `None` until the first update arrives.
    pub entities: Option<Arc<EntityMap>>,
    /// Rooms and layout, fixed for the session.
    pub topology: Arc<Topology>,
    /// Source health metadata from the tick, if it sent any.
    pub diagnostics: Option<SourceDiagnostics>,
    /// Stream session that produced this snapshot (numbered from 1; 0
    /// for snapshots built outside a session).
    pub session: u64,
}

impl WorldSnapshot {
    /// Rooms known to the world.
    pub fn rooms(&self) -> &[RoomId] {
        self.topology.rooms()
    }

    /// Spatial layout of the rooms.
    pub fn room_layout(&self) -> &RoomLayout {
        self.topology.layout()
    }

    /// Whether any update has been folded in yet.
    pub const fn is_initialized(&self) -> bool {
        self.entities.is_some()
    }

    /// Entities of one room, if the room has any recorded.
    pub fn room(&self, room: RoomId) -> Option<&RoomEntities> {
        self.entities
            .as_deref()
            .and_then(|entities| entities.get(&room))
            .map(Arc::as_ref)
    }

    /// Return this snapshot tagged with a session number.
    #[must_use]
    pub const fn with_session(mut self, session: u64) -> Self {
        self.session = session;
        self
    }
}
