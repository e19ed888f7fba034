//! State aggregator: folds updates into immutable snapshots.
//!
//! Pure and synchronous. [`apply`] never touches `previous`; it clones the
//! room map (a map of [`Arc`]s, so untouched rooms are shared, not copied)
//! and swaps in the rooms the update names.

use std::sync::Arc;

use chrono::Utc;
use hexwatch_types::RoomId;

use crate::client::RawUpdate;
use crate::snapshot::{RoomLayout, Topology, UNINITIALIZED_WORLD_TIME, WorldSnapshot};

/// Why an update could not be folded into a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    /// The update is not newer than the snapshot. Dropped and counted.
    #[error("stale update: worldTime {world_time} is not after {current}")]
    Stale {
        /// `worldTime` carried by the update.
        world_time: i64,
        /// `worldTime` of the snapshot it was applied to.
        current: i64,
    },

    /// The update names a room the source did not declare at bootstrap.
    #[error("update references undeclared room {0}")]
    UnknownRoom(RoomId),
}

/// The snapshot published right after bootstrap: topology set, no entities.
pub fn initial(rooms: Vec<RoomId>, layout: RoomLayout) -> WorldSnapshot {
    WorldSnapshot {
        world_time: UNINITIALIZED_WORLD_TIME,
        observed_at: Utc::now(),
        entities: None,
        topology: Arc::new(Topology::new(rooms, layout)),
        diagnostics: None,
        session: 0,
    }
}

/// Build the snapshot that follows `previous` once `update` is applied.
///
/// Every room named in `update` gets all three collections replaced;
/// other rooms keep their previous collections.
pub fn apply(previous: &WorldSnapshot, update: RawUpdate) -> Result<WorldSnapshot, ApplyError> {
    if update.world_time <= previous.world_time {
        return Err(ApplyError::Stale {
            world_time: update.world_time,
            current: previous.world_time,
        });
    }
    if let Some(room) = update
        .rooms
        .keys()
        .find(|room| !previous.topology.contains(**room))
    {
        return Err(ApplyError::UnknownRoom(*room));
    }

    let mut entities = previous
        .entities
        .as_deref()
        .cloned()
        .unwrap_or_default();
    for (room, collections) in update.rooms {
        entities.insert(room, Arc::new(collections));
    }

    Ok(WorldSnapshot {
        world_time: update.world_time,
        observed_at: Utc::now(),
        entities: Some(Arc::new(entities)),
        topology: Arc::clone(&previous.topology),
        diagnostics: update.diagnostics,
        session: previous.session,
    })
}
