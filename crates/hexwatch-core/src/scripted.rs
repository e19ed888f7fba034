//! A scripted, in-memory world source.
//!
//! [`ScriptedConnector`] plays back a queue of [`ScriptedSession`]s, one
//! per streaming connection: a refusal, or a room list with a canned or
//! live entity feed. Point-request connections share a terrain table and
//! never consume sessions. Once the queue is empty every streaming
//! connect is refused as unavailable.
//!
//! Used by the supervisor and relay tests; handy for demos too.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt as _;
use futures::stream::{self, BoxStream};
use hexwatch_types::{
    Axial, EntitiesMessage, RoomId, RoomLayoutReply, RoomListReply, RoomPlacement, RoomPosition,
    TerrainReply, TerrainTile,
};
use tokio::sync::mpsc;

use crate::error::SourceError;
use crate::source::{ConnectionRole, SourceConnector, WorldSource};

type Item = Result<EntitiesMessage, SourceError>;

enum Feed {
    Canned { items: Vec<Item>, hold_open: bool },
    Live(mpsc::UnboundedReceiver<Item>),
}

impl Feed {
    fn into_stream(self) -> BoxStream<'static, Item> {
        match self {
            Self::Canned { items, hold_open } if hold_open => {
                stream::iter(items).chain(stream::pending()).boxed()
            }
            Self::Canned { items, .. } => stream::iter(items).boxed(),
            Self::Live(receiver) => stream::unfold(receiver, |mut receiver| async move {
                receiver.recv().await.map(|item| (item, receiver))
            })
            .boxed(),
        }
    }
}

/// What one streaming connection will do.
pub struct ScriptedSession {
    refusal: Option<SourceError>,
    rooms: Vec<Axial>,
    layout: Vec<RoomPlacement>,
    feed: Feed,
}

impl ScriptedSession {
    /// A connection attempt that fails with `error`.
    pub fn refuse(error: SourceError) -> Self {
        Self {
            refusal: Some(error),
            ..Self::serve(&[])
        }
    }

    /// A session declaring `rooms`, with no layout and a feed that ends
    /// immediately.
    pub fn serve(rooms: &[RoomId]) -> Self {
        Self {
            refusal: None,
            rooms: rooms.iter().map(|room| room.axial()).collect(),
            layout: Vec::new(),
            feed: Feed::Canned {
                items: Vec::new(),
                hold_open: false,
            },
        }
    }

    /// A session declaring `rooms` whose feed is driven by the returned
    /// [`LiveFeed`].
    pub fn live(rooms: &[RoomId]) -> (Self, LiveFeed) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let session = Self {
            feed: Feed::Live(receiver),
            ..Self::serve(rooms)
        };
        (session, LiveFeed { sender })
    }

    /// Answer `GetRoomLayout` with these placements.
    #[must_use]
    pub fn with_layout(mut self, layout: impl IntoIterator<Item = (RoomId, RoomPosition)>) -> Self {
        self.layout = layout
            .into_iter()
            .map(|(room, position)| RoomPlacement {
                room_id: room.axial(),
                position,
            })
            .collect();
        self
    }

    /// Deliver these messages, in order, on the entity feed.
    #[must_use]
    pub fn with_updates(self, messages: impl IntoIterator<Item = EntitiesMessage>) -> Self {
        self.with_items(messages.into_iter().map(Ok))
    }

    /// Deliver these items, errors included, on the entity feed.
    #[must_use]
    pub fn with_items(mut self, items: impl IntoIterator<Item = Item>) -> Self {
        let hold_open = matches!(self.feed, Feed::Canned { hold_open: true, .. });
        self.feed = Feed::Canned {
            items: items.into_iter().collect(),
            hold_open,
        };
        self
    }

    /// Keep the canned feed open after its last item instead of ending it.
    #[must_use]
    pub fn hold_open(mut self) -> Self {
        if let Feed::Canned { hold_open, .. } = &mut self.feed {
            *hold_open = true;
        }
        self
    }
}

/// Sender side of a live scripted feed. Dropping it ends the stream.
#[derive(Debug, Clone)]
pub struct LiveFeed {
    sender: mpsc::UnboundedSender<Item>,
}

impl LiveFeed {
    /// Push one entities message. Returns `false` once the session is gone.
    pub fn send(&self, message: EntitiesMessage) -> bool {
        self.sender.send(Ok(message)).is_ok()
    }

    /// Fail the stream with `error`.
    pub fn fail(&self, error: SourceError) -> bool {
        self.sender.send(Err(error)).is_ok()
    }
}

#[derive(Default)]
struct Script {
    sessions: VecDeque<ScriptedSession>,
    terrain: BTreeMap<RoomId, Result<Vec<TerrainTile>, SourceError>>,
    stream_connects: u32,
    request_connects: u32,
}

/// A [`SourceConnector`] that plays back scripted sessions.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    /// A connector that will play `sessions` in order.
    pub fn new(sessions: impl IntoIterator<Item = ScriptedSession>) -> Self {
        let connector = Self::default();
        connector.lock().sessions.extend(sessions);
        connector
    }

    /// Serve `tiles` as the terrain of `room`.
    #[must_use]
    pub fn with_terrain(self, room: RoomId, tiles: Vec<TerrainTile>) -> Self {
        self.lock().terrain.insert(room, Ok(tiles));
        self
    }

    /// Answer terrain requests for `room` with `error`.
    #[must_use]
    pub fn with_terrain_error(self, room: RoomId, error: SourceError) -> Self {
        self.lock().terrain.insert(room, Err(error));
        self
    }

    /// Connections opened so far for `role`, refused ones included.
    pub fn connects(&self, role: ConnectionRole) -> u32 {
        let script = self.lock();
        match role {
            ConnectionRole::Stream => script.stream_connects,
            ConnectionRole::Requests => script.request_connects,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SourceConnector for ScriptedConnector {
    type Source = ScriptedSource;

    async fn connect(&self, role: ConnectionRole) -> Result<ScriptedSource, SourceError> {
        let mut script = self.lock();
        let terrain = script.terrain.clone();
        match role {
            ConnectionRole::Requests => {
                script.request_connects = script.request_connects.saturating_add(1);
                Ok(ScriptedSource {
                    rooms: Vec::new(),
                    layout: Vec::new(),
                    terrain,
                    feed: Mutex::new(None),
                })
            }
            ConnectionRole::Stream => {
                script.stream_connects = script.stream_connects.saturating_add(1);
                let Some(session) = script.sessions.pop_front() else {
                    return Err(SourceError::Unavailable(String::from(
                        "scripted source has no session left",
                    )));
                };
                if let Some(error) = session.refusal {
                    return Err(error);
                }
                Ok(ScriptedSource {
                    rooms: session.rooms,
                    layout: session.layout,
                    terrain,
                    feed: Mutex::new(Some(session.feed)),
                })
            }
        }
    }
}

/// One open scripted connection.
pub struct ScriptedSource {
    rooms: Vec<Axial>,
    layout: Vec<RoomPlacement>,
    terrain: BTreeMap<RoomId, Result<Vec<TerrainTile>, SourceError>>,
    feed: Mutex<Option<Feed>>,
}

impl WorldSource for ScriptedSource {
    type Updates = BoxStream<'static, Item>;

    async fn list_rooms(&self) -> Result<RoomListReply, SourceError> {
        Ok(RoomListReply {
            room_ids: self.rooms.clone(),
        })
    }

    async fn room_layout(&self) -> Result<RoomLayoutReply, SourceError> {
        Ok(RoomLayoutReply {
            positions: self.layout.clone(),
        })
    }

    async fn room_terrain(&self, room: Axial) -> Result<TerrainReply, SourceError> {
        let id = RoomId::from(room);
        match self.terrain.get(&id) {
            Some(Ok(tiles)) => Ok(TerrainReply {
                room_id: room,
                tiles: tiles.clone(),
            }),
            Some(Err(error)) => Err(error.clone()),
            None => Err(SourceError::RoomNotFound(id)),
        }
    }

    async fn subscribe_entities(&self) -> Result<Self::Updates, SourceError> {
        self.feed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .map(Feed::into_stream)
            .ok_or_else(|| SourceError::Protocol(String::from("connection already subscribed")))
    }
}
