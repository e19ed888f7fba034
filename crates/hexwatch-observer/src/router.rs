//! Axum router construction for the observer relay.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the observer relay.
///
/// The router includes:
/// - `GET /` -- minimal HTML status page
/// - `GET /ws/objects` -- `WebSocket` room object stream
/// - `GET /api/status` -- supervisor phase and counters
/// - `GET /api/rooms` -- room list and layout
/// - `GET /api/rooms/{room_id}/objects` -- entities of one room
/// - `GET /api/rooms/{room_id}/terrain` -- terrain of one room
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Status page
        .route("/", get(handlers::index))
        // WebSocket
        .route("/ws/objects", get(ws::ws_objects))
        // REST API
        .route("/api/status", get(handlers::get_status))
        .route("/api/rooms", get(handlers::list_rooms))
        .route("/api/rooms/{room_id}/objects", get(handlers::get_room_objects))
        .route("/api/rooms/{room_id}/terrain", get(handlers::get_room_terrain))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
