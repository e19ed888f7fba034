//! Payload decoding and error classification for the NATS transport.

use async_nats::{ConnectErrorKind, RequestErrorKind};
use hexwatch_core::SourceError;
use hexwatch_types::{EntitiesMessage, ErrorCode, Reply, RoomId};
use serde::de::DeserializeOwned;

/// Decode a request reply envelope.
///
/// `room` is the room a terrain request asked about; it turns a
/// `not_found` reply into [`SourceError::RoomNotFound`]. For requests that
/// name no room, `not_found` is a protocol error.
pub fn decode_reply<T: DeserializeOwned>(
    operation: &str,
    payload: &[u8],
    room: Option<RoomId>,
) -> Result<T, SourceError> {
    let reply: Reply<T> = serde_json::from_slice(payload).map_err(|e| {
        SourceError::Protocol(format!("undecodable {operation} reply: {e}"))
    })?;
    match reply {
        Reply::Ok { body } => Ok(body),
        Reply::Error { code, message } => Err(reply_error(operation, code, message, room)),
    }
}

/// Decode one message of the entity subscription.
pub fn decode_entities(payload: &[u8]) -> Result<EntitiesMessage, SourceError> {
    serde_json::from_slice(payload)
        .map_err(|e| SourceError::Protocol(format!("undecodable entities message: {e}")))
}

fn reply_error(
    operation: &str,
    code: ErrorCode,
    message: String,
    room: Option<RoomId>,
) -> SourceError {
    match (code, room) {
        (ErrorCode::NotFound, Some(room)) => SourceError::RoomNotFound(room),
        (ErrorCode::NotFound | ErrorCode::InvalidArgument, _) => {
            SourceError::Protocol(format!("{operation} rejected ({code:?}): {message}"))
        }
        (ErrorCode::PermissionDenied, _) => {
            SourceError::PermissionDenied(format!("{operation}: {message}"))
        }
        (ErrorCode::Unavailable | ErrorCode::Internal, _) => {
            SourceError::Unavailable(format!("{operation} failed ({code:?}): {message}"))
        }
    }
}

/// Classify a failed connection attempt.
pub fn connect_error(kind: ConnectErrorKind, detail: String) -> SourceError {
    match kind {
        ConnectErrorKind::Authentication | ConnectErrorKind::AuthorizationViolation => {
            SourceError::PermissionDenied(detail)
        }
        ConnectErrorKind::ServerParse | ConnectErrorKind::Tls => SourceError::Config(detail),
        _ => SourceError::Unavailable(detail),
    }
}

/// Classify a failed request.
pub fn request_error(operation: &str, kind: RequestErrorKind, detail: &str) -> SourceError {
    match kind {
        RequestErrorKind::NoResponders => {
            SourceError::Unavailable(format!("{operation}: no source is listening"))
        }
        RequestErrorKind::TimedOut => {
            SourceError::Unavailable(format!("{operation}: request timed out"))
        }
        _ => SourceError::Unavailable(format!("{operation}: {detail}")),
    }
}
