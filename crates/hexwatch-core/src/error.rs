//! Error taxonomy of the mirror.
//!
//! Transient failures ([`SourceError`] values whose
//! [`is_retryable`](SourceError::is_retryable) is `true`) never leave the
//! supervisor's retry loop. Expected negative outcomes reach callers as
//! [`QueryError`]. Only a [`FatalError`] stops the mirror.

use hexwatch_types::RoomId;

/// Failures talking to the world source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The source could not be reached, or a request timed out.
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// The source answered with something malformed or unexpected.
    #[error("source protocol error: {0}")]
    Protocol(String),

    /// The source reports that the requested room does not exist.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// The source refused the connection or request outright.
    #[error("permission denied by source: {0}")]
    PermissionDenied(String),

    /// The connection settings themselves are unusable.
    #[error("invalid source configuration: {0}")]
    Config(String),

    /// The entity subscription closed.
    #[error("entity stream ended")]
    StreamEnded,
}

impl SourceError {
    /// Whether the supervisor should back off and re-bootstrap after this
    /// failure, as opposed to stopping.
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::PermissionDenied(_) | Self::Config(_))
    }
}

/// Failures returned to readers of the query layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// No snapshot with entity data exists yet; retry later.
    #[error("world state not initialized yet")]
    NotInitialized,

    /// The source does not know the room.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// The source could not answer a point request.
    #[error("source error: {0}")]
    Source(SourceError),
}

impl From<SourceError> for QueryError {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::RoomNotFound(room) => Self::RoomNotFound(room),
            other => Self::Source(other),
        }
    }
}

/// A condition that terminates the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalError {
    /// The source failed in a way retrying cannot fix.
    #[error("non-retryable source failure: {source}")]
    NonRetryable {
        /// The failure that stopped the supervisor.
        source: SourceError,
    },

    /// The configured retry ceiling was exceeded.
    #[error("gave up after {attempts} consecutive failures; last: {last}")]
    RetriesExhausted {
        /// Consecutive failures observed.
        attempts: u32,
        /// The last failure.
        last: SourceError,
    },
}

/// Error a subscriber returns to report that it could not handle a
/// snapshot. Logged and counted, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SubscriberError {
    /// What went wrong.
    pub message: String,
}

impl SubscriberError {
    /// Build an error from anything printable.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors surfaced by the [`StateManager`](crate::manager::StateManager)
/// to its owner.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    /// The supervisor stopped on a fatal condition.
    #[error("supervisor stopped: {source}")]
    Fatal {
        /// The fatal condition.
        #[from]
        source: FatalError,
    },

    /// The supervisor task panicked or was aborted.
    #[error("supervisor task failed: {message}")]
    Task {
        /// Description of the task failure.
        message: String,
    },
}
