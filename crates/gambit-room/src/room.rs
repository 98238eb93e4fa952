//! A single live match between two users.

use gambit_protocol::{Board, EMPTY_BOARD, Member, RoomId, UserId};
use serde::{Deserialize, Serialize};

use crate::completion::unix_millis;

/// Authoritative state of one in-progress match.
///
/// `users[0]` is the challenged party (the one who accepted) and
/// `users[1]` the challenger. The board and turn flag are whatever the
/// last move event said; the server does not judge them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: RoomId,
    pub users: [Member; 2],
    pub board: Board,
    /// `true` while the first mover (X) is up.
    #[serde(rename = "isXNext")]
    pub turn_is_first: bool,
    /// Milliseconds since the Unix epoch.
    pub created_at: u64,
}

impl Room {
    /// A fresh room: empty board, X to move.
    pub fn new(
        room_id: RoomId,
        challenged: Member,
        challenger: Member,
    ) -> Self {
        Self {
            room_id,
            users: [challenged, challenger],
            board: EMPTY_BOARD,
            turn_is_first: true,
            created_at: unix_millis(),
        }
    }

    /// The party who accepted the challenge.
    pub fn challenged(&self) -> &Member {
        &self.users[0]
    }

    /// The party who sent the challenge.
    pub fn challenger(&self) -> &Member {
        &self.users[1]
    }

    pub fn has_member(&self, user_id: &UserId) -> bool {
        self.users.iter().any(|m| m.user_id == *user_id)
    }

    /// The member who is not `user_id`, if `user_id` sits in this room.
    pub fn opponent_of(&self, user_id: &UserId) -> Option<&Member> {
        match &self.users {
            [a, b] if a.user_id == *user_id => Some(b),
            [a, b] if b.user_id == *user_id => Some(a),
            _ => None,
        }
    }
}
