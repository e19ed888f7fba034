//! Remote stream client: validated, deadline-bounded access to a
//! [`WorldSource`].
//!
//! The client turns raw protocol replies into the mirror's domain types
//! and rejects anything that would corrupt a snapshot: duplicate rooms,
//! layout entries for undeclared rooms, ticks beyond the representable
//! range, terrain for the wrong room. Rejections surface as
//! [`SourceError::Protocol`].

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::Duration;

use futures::StreamExt as _;
use futures::stream::Map;
use hexwatch_types::{EntitiesMessage, RoomId, SourceDiagnostics, TerrainTile};
use tracing::debug;

use crate::error::SourceError;
use crate::snapshot::{RoomEntities, RoomLayout};
use crate::source::WorldSource;

/// The static world description fetched when a session starts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bootstrap {
    /// Every room of the world, in source order.
    pub rooms: Vec<RoomId>,
    /// Spatial layout of the rooms.
    pub layout: RoomLayout,
}

/// One validated tick of the entity subscription.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawUpdate {
    /// The source's logical clock after the tick.
    pub world_time: i64,
    /// New collections for every room touched by the tick.
    pub rooms: BTreeMap<RoomId, RoomEntities>,
    /// Source health metadata, when sent.
    pub diagnostics: Option<SourceDiagnostics>,
}

impl TryFrom<EntitiesMessage> for RawUpdate {
    type Error = SourceError;

    fn try_from(message: EntitiesMessage) -> Result<Self, Self::Error> {
        let world_time = i64::try_from(message.world_time).map_err(|e| {
            SourceError::Protocol(format!("worldTime {} out of range: {e}", message.world_time))
        })?;

        let mut rooms: BTreeMap<RoomId, RoomEntities> = BTreeMap::new();
        let mut seen = BTreeSet::new();
        for entry in message.bots {
            let room = RoomId::from(entry.room_id);
            claim(&mut seen, "bots", room)?;
            rooms.entry(room).or_default().bots = entry.bots;
        }
        seen.clear();
        for entry in message.structures {
            let room = RoomId::from(entry.room_id);
            claim(&mut seen, "structures", room)?;
            rooms.entry(room).or_default().structures = entry.structures;
        }
        seen.clear();
        for entry in message.resources {
            let room = RoomId::from(entry.room_id);
            claim(&mut seen, "resources", room)?;
            rooms.entry(room).or_default().resources = entry.resources;
        }

        Ok(Self {
            world_time,
            rooms,
            diagnostics: message.diagnostics,
        })
    }
}

type DecodeFn = fn(Result<EntitiesMessage, SourceError>) -> Result<RawUpdate, SourceError>;

/// The entity subscription, decoded into [`RawUpdate`]s.
pub type RawUpdates<U> = Map<U, DecodeFn>;

fn decode(item: Result<EntitiesMessage, SourceError>) -> Result<RawUpdate, SourceError> {
    item.and_then(RawUpdate::try_from)
}

/// Record that `room` appeared in `category`; a second appearance in the
/// same message is a protocol error.
fn claim(
    seen: &mut BTreeSet<RoomId>,
    category: &'static str,
    room: RoomId,
) -> Result<(), SourceError> {
    if seen.insert(room) {
        Ok(())
    } else {
        Err(SourceError::Protocol(format!(
            "room {room} listed twice in {category} of one tick"
        )))
    }
}

/// Validating client over one source connection.
#[derive(Debug)]
pub struct StreamClient<S> {
    source: S,
    request_timeout: Duration,
}

impl<S: WorldSource> StreamClient<S> {
    /// Wrap an open connection. Every point request and the subscription
    /// open are bounded by `request_timeout`.
    pub const fn new(source: S, request_timeout: Duration) -> Self {
        Self {
            source,
            request_timeout,
        }
    }

    /// Fetch the room list and layout.
    pub async fn bootstrap(&self) -> Result<Bootstrap, SourceError> {
        let listed = self.timed("ListRooms", self.source.list_rooms()).await?;
        let placements = self.timed("GetRoomLayout", self.source.room_layout()).await?;

        let mut rooms = Vec::with_capacity(listed.room_ids.len());
        let mut declared = BTreeSet::new();
        for axial in listed.room_ids {
            let room = RoomId::from(axial);
            if !declared.insert(room) {
                return Err(SourceError::Protocol(format!(
                    "room {room} listed twice by ListRooms"
                )));
            }
            rooms.push(room);
        }

        let mut layout = RoomLayout::new();
        for placement in placements.positions {
            let room = RoomId::from(placement.room_id);
            if !declared.contains(&room) {
                return Err(SourceError::Protocol(format!(
                    "layout places undeclared room {room}"
                )));
            }
            match layout.entry(room) {
                Entry::Vacant(slot) => {
                    slot.insert(placement.position);
                }
                Entry::Occupied(_) => {
                    return Err(SourceError::Protocol(format!(
                        "layout places room {room} twice"
                    )));
                }
            }
        }

        debug!(rooms = rooms.len(), placed = layout.len(), "Bootstrap fetched");
        Ok(Bootstrap { rooms, layout })
    }

    /// Open the entity subscription.
    ///
    /// Only opening is bounded by the request deadline; the returned
    /// sequence is long-lived and its items are never timed out.
    pub async fn subscribe(&self) -> Result<RawUpdates<S::Updates>, SourceError> {
        let updates = self
            .timed("SubscribeEntities", self.source.subscribe_entities())
            .await?;
        Ok(updates.map(decode as DecodeFn))
    }

    /// Fetch one room's terrain.
    pub async fn fetch_terrain(&self, room: RoomId) -> Result<Vec<TerrainTile>, SourceError> {
        let reply = self
            .timed("GetRoomTerrain", self.source.room_terrain(room.axial()))
            .await?;
        let answered = RoomId::from(reply.room_id);
        if answered != room {
            return Err(SourceError::Protocol(format!(
                "asked for terrain of {room}, got {answered}"
            )));
        }
        Ok(reply.tiles)
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        request: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, SourceError> {
        tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|elapsed| {
                SourceError::Unavailable(format!(
                    "{operation} gave no answer within {}ms ({elapsed})",
                    self.request_timeout.as_millis()
                ))
            })?
    }
}
