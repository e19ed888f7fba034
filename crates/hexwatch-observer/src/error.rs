//! Error types for the observer relay.
//!
//! [`ObserverError`] unifies the failure modes of the REST handlers into a
//! single enum that converts into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hexwatch_core::QueryError;

/// Errors that can occur in the observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// No session has bootstrapped yet.
    #[error("world state not initialized yet")]
    NotInitialized,

    /// The requested room does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A room id could not be parsed from the request path.
    #[error("invalid room id: {0}")]
    InvalidRoomId(String),

    /// The world source failed to answer.
    #[error("source error: {0}")]
    Upstream(String),

    /// A serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<QueryError> for ObserverError {
    fn from(error: QueryError) -> Self {
        match error {
            QueryError::NotInitialized => Self::NotInitialized,
            QueryError::RoomNotFound(room) => Self::NotFound(format!("room {room}")),
            QueryError::Source(source) => Self::Upstream(source.to_string()),
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRoomId(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use hexwatch_core::SourceError;
    use hexwatch_types::RoomId;

    use super::*;

    #[test]
    fn query_errors_map_to_statuses() {
        let status = |error: QueryError| ObserverError::from(error).into_response().status();
        assert_eq!(status(QueryError::NotInitialized), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status(QueryError::RoomNotFound(RoomId::new(2, 2))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(QueryError::Source(SourceError::Unavailable(String::from("down")))),
            StatusCode::BAD_GATEWAY
        );
    }
}
