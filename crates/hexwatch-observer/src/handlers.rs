//! REST API endpoint handlers for the observer relay.
//!
//! Every handler reads the latest published snapshot through the shared
//! [`AppState`]; none waits on the supervisor. Terrain is the one
//! exception: it is fetched from the source on each request.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/` | Minimal HTML status page |
//! | `GET` | `/api/status` | Supervisor phase, counters, diagnostics |
//! | `GET` | `/api/rooms` | Room list and layout |
//! | `GET` | `/api/rooms/{room_id}/objects` | Entities of one room |
//! | `GET` | `/api/rooms/{room_id}/terrain` | Static terrain of one room |

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse};
use hexwatch_types::RoomId;

use crate::error::ObserverError;
use crate::state::AppState;

fn parse_room_id(raw: &str) -> Result<RoomId, ObserverError> {
    raw.parse()
        .map_err(|e| ObserverError::InvalidRoomId(format!("{raw:?}: {e}")))
}

// ---------------------------------------------------------------------------
// GET / -- minimal HTML status page
// ---------------------------------------------------------------------------

/// Serve a minimal HTML page showing sync status and API links.
pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let phase = format!("{:?}", state.world.phase());
    let current = state.world.current();
    let world_time = current
        .as_ref()
        .filter(|snapshot| snapshot.is_initialized())
        .map_or_else(|| String::from("-"), |snapshot| snapshot.world_time.to_string());
    let room_count = current.as_ref().map_or(0, |snapshot| snapshot.rooms().len());
    let clients = state.client_count();

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Hexwatch Observer</title>
    <style>
        body {{
            background: #0d1117;
            color: #c9d1d9;
            font-family: 'Cascadia Code', 'Fira Code', 'Consolas', monospace;
            padding: 2rem;
            max-width: 800px;
            margin: 0 auto;
        }}
        h1 {{ color: #58a6ff; margin-bottom: 0.25rem; }}
        .subtitle {{ color: #8b949e; margin-top: 0; }}
        .metric {{
            display: inline-block;
            background: #161b22;
            border: 1px solid #30363d;
            border-radius: 6px;
            padding: 1rem 1.5rem;
            margin: 0.5rem 0.5rem 0.5rem 0;
            min-width: 120px;
        }}
        .metric .label {{ color: #8b949e; font-size: 0.85rem; }}
        .metric .value {{ color: #58a6ff; font-size: 1.5rem; font-weight: bold; }}
        a {{ color: #58a6ff; text-decoration: none; }}
        ul {{ list-style: none; padding: 0; }}
        li {{ padding: 0.3rem 0; }}
        li::before {{ content: "GET "; color: #7ee787; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Hexwatch Observer</h1>
    <p class="subtitle">World-state mirror relay</p>

    <div>
        <div class="metric">
            <div class="label">Phase</div>
            <div class="value">{phase}</div>
        </div>
        <div class="metric">
            <div class="label">World time</div>
            <div class="value">{world_time}</div>
        </div>
        <div class="metric">
            <div class="label">Rooms</div>
            <div class="value">{room_count}</div>
        </div>
        <div class="metric">
            <div class="label">Stream clients</div>
            <div class="value">{clients}</div>
        </div>
    </div>

    <h2>API Endpoints</h2>
    <ul>
        <li><a href="/api/status">/api/status</a> -- Sync status</li>
        <li><a href="/api/rooms">/api/rooms</a> -- Rooms and layout</li>
        <li>/api/rooms/{{room_id}}/objects -- Entities of one room</li>
        <li>/api/rooms/{{room_id}}/terrain -- Terrain of one room</li>
    </ul>

    <h2>WebSocket</h2>
    <ul>
        <li style="list-style:none;"><code>ws://host:port/ws/objects</code> -- Send a room id, receive its entities every tick</li>
    </ul>
</body>
</html>"#
    ))
}

// ---------------------------------------------------------------------------
// GET /api/status -- supervisor phase and counters
// ---------------------------------------------------------------------------

/// Report what the supervisor is doing and what it has published.
///
/// Always `200`: before the first bootstrap the snapshot fields are null.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let current = state.world.current();
    let initialized = current.as_ref().is_some_and(|snapshot| snapshot.is_initialized());

    Ok(Json(serde_json::json!({
        "phase": serde_json::to_value(state.world.phase())?,
        "initialized": initialized,
        "worldTime": current.as_ref().map(|snapshot| snapshot.world_time),
        "session": current.as_ref().map(|snapshot| snapshot.session),
        "observedAt": current.as_ref().map(|snapshot| snapshot.observed_at),
        "diagnostics": current.as_ref().and_then(|snapshot| snapshot.diagnostics.clone()),
        "counters": serde_json::to_value(state.world.counters())?,
        "subscribers": state.world.registry().len(),
    })))
}

// ---------------------------------------------------------------------------
// GET /api/rooms -- topology
// ---------------------------------------------------------------------------

/// The rooms declared by the current session, in source order, and their
/// display positions.
pub async fn list_rooms(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let snapshot = state.world.current().ok_or(ObserverError::NotInitialized)?;

    Ok(Json(serde_json::json!({
        "session": snapshot.session,
        "count": snapshot.rooms().len(),
        "rooms": snapshot.rooms(),
        "layout": snapshot.room_layout(),
    })))
}

// ---------------------------------------------------------------------------
// GET /api/rooms/{room_id}/objects -- entities of one room
// ---------------------------------------------------------------------------

/// The entities of one room as of the latest world time.
pub async fn get_room_objects(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let room = parse_room_id(&room_id)?;
    let view = state.world.room_objects(room)?;
    Ok(Json(view))
}

// ---------------------------------------------------------------------------
// GET /api/rooms/{room_id}/terrain -- static terrain
// ---------------------------------------------------------------------------

/// The terrain of one room, fetched from the source.
pub async fn get_room_terrain(
    State(state): State<Arc<AppState>>,
    Path(room_id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let room = parse_room_id(&room_id)?;
    let tiles = state.world.terrain(room).await?;
    Ok(Json(serde_json::json!({
        "roomId": room,
        "count": tiles.len(),
        "tiles": tiles,
    })))
}
