//! `WebSocket` handler for live room object streaming.
//!
//! Clients connect to `GET /ws/objects` and send a room id as a text
//! frame. The server answers with a `terrain` frame and an `entities`
//! frame for that room, then pushes a fresh `entities` frame every time a
//! new snapshot is published. Sending another room id switches rooms.
//!
//! A client that falls behind the broadcast channel skips straight to the
//! newest snapshot.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use hexwatch_core::query;
use hexwatch_core::{QueryError, WorldSnapshot};
use hexwatch_types::{RoomId, RoomObjectsView, TerrainTile};
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::AppState;

/// One server-to-client frame, tagged by `ty`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "ty", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Frame {
    /// Static terrain of the selected room.
    Terrain {
        /// The room.
        room_id: RoomId,
        /// Its tiles.
        tiles: Vec<TerrainTile>,
    },
    /// Entities of the selected room at one world time.
    Entities(RoomObjectsView),
    /// Something the client asked for could not be served.
    Error {
        /// Human-readable reason.
        error: String,
    },
}

impl Frame {
    fn error(error: &impl std::fmt::Display) -> Self {
        Self::Error {
            error: error.to_string(),
        }
    }
}

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming room objects.
///
/// # Route
///
/// `GET /ws/objects`
pub async fn ws_objects(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// What woke the connection loop.
enum Wake {
    Snapshot(Arc<WorldSnapshot>),
    Lagged(u64),
    Select(String),
    Ping(axum::body::Bytes),
    Closed,
}

async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    debug!("WebSocket client connected");

    let mut rx = state.subscribe();
    let mut selected: Option<RoomId> = None;

    loop {
        let wake = tokio::select! {
            result = rx.recv() => match result {
                Ok(snapshot) => Wake::Snapshot(snapshot),
                Err(RecvError::Lagged(skipped)) => Wake::Lagged(skipped),
                Err(RecvError::Closed) => Wake::Closed,
            },
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => Wake::Select(text.as_str().to_owned()),
                Some(Ok(Message::Ping(data))) => Wake::Ping(data),
                Some(Ok(Message::Close(_))) | None => Wake::Closed,
                Some(Err(e)) => {
                    debug!("WebSocket error: {e}");
                    Wake::Closed
                }
                // Binary and pong frames carry nothing for us.
                Some(Ok(_)) => continue,
            },
        };

        let delivered = match wake {
            Wake::Snapshot(snapshot) => match selected {
                Some(room) => push_entities(&mut socket, &snapshot, room).await,
                None => true,
            },
            Wake::Lagged(skipped) => {
                debug!(skipped, "WebSocket client lagged, skipping to newest snapshot");
                rx = rx.resubscribe();
                match (selected, state.world.current()) {
                    (Some(room), Some(snapshot)) => {
                        push_entities(&mut socket, &snapshot, room).await
                    }
                    _ => true,
                }
            }
            Wake::Select(text) => match text.trim().parse::<RoomId>() {
                Ok(room) => {
                    debug!(room = %room, "WebSocket client selected room");
                    selected = Some(room);
                    select_room(&mut socket, &state, room).await
                }
                Err(e) => send(&mut socket, &Frame::error(&e)).await,
            },
            Wake::Ping(data) => socket.send(Message::Pong(data)).await.is_ok(),
            Wake::Closed => {
                debug!("WebSocket client disconnected");
                return;
            }
        };

        if !delivered {
            debug!("WebSocket client disconnected (send failed)");
            return;
        }
    }
}

/// Send terrain and current entities for a newly selected room.
async fn select_room(socket: &mut WebSocket, state: &AppState, room: RoomId) -> bool {
    let terrain = match state.world.terrain(room).await {
        Ok(tiles) => Frame::Terrain {
            room_id: room,
            tiles,
        },
        Err(e) => Frame::error(&e),
    };
    if !send(socket, &terrain).await {
        return false;
    }

    let entities = match state.world.room_objects(room) {
        Ok(view) => Frame::Entities(view),
        Err(e) => Frame::error(&e),
    };
    send(socket, &entities).await
}

async fn push_entities(socket: &mut WebSocket, snapshot: &WorldSnapshot, room: RoomId) -> bool {
    match query::room_objects(snapshot, room) {
        Ok(view) => send(socket, &Frame::Entities(view)).await,
        // Only bootstrap snapshots lack entities, and they are never relayed.
        Err(QueryError::NotInitialized) => true,
        Err(e) => send(socket, &Frame::error(&e)).await,
    }
}

/// Serialize and send one frame. `false` means the client is gone.
async fn send(socket: &mut WebSocket, frame: &Frame) -> bool {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!("Failed to serialize WebSocket frame: {e}");
            return true;
        }
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}
