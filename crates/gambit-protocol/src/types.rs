//! Wire types for Gambit.
//!
//! Every frame on the event channel is a JSON object of the shape
//! `{"event": "<name>", "data": <payload>}`. Client-originated frames
//! decode into [`ClientEvent`], server-originated ones encode from
//! [`ServerEvent`]. Field names are camelCase on the wire because the
//! browser client is written against those names.

use std::fmt;

use gambit_transport::ConnectionId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Stable identifier for a user, as issued by the identity provider.
///
/// Opaque to the core; `#[serde(transparent)]` keeps it a bare string on
/// the wire.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Creates a `UserId` from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier for a room (one match between two users).
///
/// Server-generated ids are 32 lowercase hex characters, but clients
/// echo back whatever they were given, so any string is accepted.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RoomId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// A mark placed in a board cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

/// Nine cells in row-major order; `None` is an empty cell (`null` on the
/// wire). Fixed length, so a malformed board fails to decode instead of
/// reaching a room.
pub type Board = [Option<Mark>; 9];

/// The board every room starts with.
pub const EMPTY_BOARD: Board = [None; 9];

// ---------------------------------------------------------------------------
// Participants
// ---------------------------------------------------------------------------

/// A user as they appear inside challenges and rooms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub user_id: UserId,
    #[serde(rename = "fullName")]
    pub display_name: String,
}

impl Member {
    pub fn new(
        user_id: impl Into<UserId>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// One connected, identified user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub user_id: UserId,
    #[serde(rename = "fullName")]
    pub display_name: String,
    pub connection_id: ConnectionId,
}

impl PresenceEntry {
    /// The entry's identity without the transport handle.
    pub fn member(&self) -> Member {
        Member {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
        }
    }
}

/// A challenge that was delivered to its opponent and awaits an answer.
///
/// Never stored: it exists only in the `receiveChallenge` notification and
/// in the return value handed back to the sender's task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChallenge {
    pub challenger_id: UserId,
    pub challenger_name: String,
    pub opponent_id: UserId,
    pub proposed_room_id: RoomId,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events a client sends over its connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Identify this connection as a user.
    Login { id: UserId, full_name: String },

    /// Drop the presence entry for a connection. Defaults to the sender's.
    Logout {
        #[serde(default)]
        connection_id: Option<ConnectionId>,
    },

    /// Propose a match to another user.
    SendChallenge { opponent_id: UserId, challenger: Member },

    /// Accept a received challenge; creates the room.
    AcceptChallenge {
        room_id: RoomId,
        challenger: Member,
        challenged_to: Member,
    },

    /// Turn a received challenge down.
    DeclineChallenge {
        challenger: Member,
        challenged_to: Member,
    },

    /// Replace a room's board. Trusted as sent.
    UpdateBoard {
        board: Board,
        room_id: RoomId,
        is_x_next: bool,
    },

    /// Forfeit and leave a room.
    LeaveRoom {
        room_id: RoomId,
        user_id: UserId,
        full_name: String,
    },

    /// Someone opened another user's profile page.
    ProfileVisit {
        visited_user_id: UserId,
        visitor_name: String,
        visitor_id: UserId,
    },

    /// Keep-alive; answered with [`ServerEvent::HeartbeatAck`].
    Heartbeat { client_time: u64 },
}

/// Events the server pushes to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// First frame on every connection.
    Connected {
        connection_id: ConnectionId,
        server_time: u64,
    },

    /// The full presence set.
    ActiveUsers(Vec<PresenceEntry>),

    ReceiveChallenge { challenger: Member, room_id: RoomId },

    /// A challenge could not proceed because a party is already playing.
    AlreadyInRoom { message: String },

    ChallengeAccepted {
        room_id: RoomId,
        challenger: Member,
        challenged_to: Member,
    },

    ChallengeDeclined {
        challenger: Member,
        challenged_to: Member,
    },

    /// The opponent moved.
    UpdateBoard { board: Board, is_x_next: bool },

    /// The opponent left the room; the recipient wins by forfeit.
    PlayerLeft { full_name: String },

    ProfileVisit {
        visitor_name: String,
        visited_user_id: UserId,
    },

    HeartbeatAck { client_time: u64, server_time: u64 },

    /// Something went wrong handling the last event. `code` follows HTTP
    /// conventions (401 unauthorized, 409 conflict).
    Error { code: u16, message: String },
}

/// Body of a reported game result (`POST /game-completed`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameReport {
    pub room_id: RoomId,
    #[serde(default)]
    pub winner_id: Option<UserId>,
    /// `false` means the game was drawn.
    pub is_winner: bool,
    pub board: Board,
    pub challenger: UserId,
    pub challenged_to: UserId,
}

// =========================================================================
// Tests
// =========================================================================
