//! Axial coordinates and the room identifiers derived from them.
//!
//! Every per-room collection in the mirror is keyed by a [`RoomId`]. A
//! room id is nothing more than the room's [`Axial`] coordinate pair,
//! rendered in a canonical text form (`"q,r"`) whenever it crosses a
//! text boundary (JSON map keys, URL paths, `WebSocket` frames).
//!
//! The mapping from `(q, r)` to text is deterministic and injective: the
//! same pair always renders to the same string, and two distinct pairs
//! never share one.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ts_rs::TS;

/// A position on a hexagonal grid in axial coordinates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct Axial {
    /// Column axis.
    pub q: i32,
    /// Row axis.
    pub r: i32,
}

impl Axial {
    /// Create a coordinate pair.
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }
}

impl fmt::Display for Axial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}

/// Error returned when a string is not a valid room identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid room id {input:?}: expected \"q,r\" or \"q;r\" with integer axes")]
pub struct InvalidRoomId {
    /// The rejected input.
    pub input: String,
}

/// Identifier of a room, derived from the room's axial coordinates.
///
/// Serializes as the canonical string `"q,r"`. Parsing additionally
/// accepts `"q;r"`, the separator used by older object-stream clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RoomId(pub Axial);

impl RoomId {
    /// Build the identifier of the room at `(q, r)`.
    pub const fn new(q: i32, r: i32) -> Self {
        Self(Axial::new(q, r))
    }

    /// Return the room's axial coordinates.
    pub const fn axial(self) -> Axial {
        self.0
    }
}

impl From<Axial> for RoomId {
    fn from(axial: Axial) -> Self {
        Self(axial)
    }
}

impl From<RoomId> for Axial {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.0.q, self.0.r)
    }
}

impl FromStr for RoomId {
    type Err = InvalidRoomId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidRoomId {
            input: s.to_owned(),
        };
        let (q, r) = s
            .trim()
            .split_once([',', ';'])
            .ok_or_else(invalid)?;
        let q = q.trim().parse::<i32>().ok().ok_or_else(invalid)?;
        let r = r.trim().parse::<i32>().ok().ok_or_else(invalid)?;
        Ok(Self::new(q, r))
    }
}

impl Serialize for RoomId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
