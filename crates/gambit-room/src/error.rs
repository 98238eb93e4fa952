//! Error types for the room layer.

use gambit_protocol::{RoomId, UserId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist (never created, or already finished).
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// A room with this id is already live. Never overwritten.
    #[error("room {0} already exists")]
    Duplicate(RoomId),

    /// The user is already a member of another live room.
    #[error("user {0} is already in a room")]
    Conflict(UserId),

    /// Both seats would go to the same user.
    #[error("user {0} cannot play against themselves")]
    SelfMatch(UserId),
}

/// Errors reported by a [`PersistenceSink`](crate::PersistenceSink).
///
/// Always logged and absorbed by the caller: a failed write never keeps
/// a finished room alive.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("ledger i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    /// The backing store refused or could not be reached.
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}
