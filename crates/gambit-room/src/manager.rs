//! Room store: creates, tracks, mutates, and removes live rooms.
//!
//! # Concurrency note
//!
//! `RoomManager` is a plain single-owner struct. The coordinator keeps it
//! behind one mutex, which is what totally orders moves, departures, and
//! finalization for a room. Removal hands the `Room` back by value; whoever
//! receives it owns the one and only finalization of that match.

use std::collections::HashMap;

use gambit_protocol::{Board, Member, RoomId, UserId};
use rand::Rng;

use crate::{Room, RoomError};

/// A room claimed because one of its members left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// The room as it was when claimed (already out of the live set).
    pub room: Room,
    pub leaving: Member,
    /// Wins by forfeit.
    pub remaining: Member,
}

/// Owns every live room and the user → room membership index.
#[derive(Debug, Default)]
pub struct RoomManager {
    rooms: HashMap<RoomId, Room>,

    /// Which room each user is playing in. A user is in at most ONE live
    /// room; `create` refuses anything that would break that.
    members: HashMap<UserId, RoomId>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new room with an empty board and X to move.
    ///
    /// The membership check and the insert happen in one step, so two
    /// racing acceptances cannot both seat the same user.
    ///
    /// # Errors
    /// - [`RoomError::Duplicate`] if `room_id` is already live
    /// - [`RoomError::SelfMatch`] if both members are the same user
    /// - [`RoomError::Conflict`] if either member is in another room
    pub fn create(
        &mut self,
        room_id: RoomId,
        challenged: Member,
        challenger: Member,
    ) -> Result<&Room, RoomError> {
        if self.rooms.contains_key(&room_id) {
            return Err(RoomError::Duplicate(room_id));
        }
        if challenged.user_id == challenger.user_id {
            return Err(RoomError::SelfMatch(challenged.user_id));
        }
        for member in [&challenged, &challenger] {
            if self.members.contains_key(&member.user_id) {
                return Err(RoomError::Conflict(member.user_id.clone()));
            }
        }

        self.members
            .insert(challenged.user_id.clone(), room_id.clone());
        self.members
            .insert(challenger.user_id.clone(), room_id.clone());

        tracing::info!(
            %room_id,
            challenged = %challenged.user_id,
            challenger = %challenger.user_id,
            "room created"
        );
        let room = Room::new(room_id, challenged, challenger);
        Ok(self.rooms.entry(room.room_id.clone()).or_insert(room))
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// The live room `user_id` plays in, if any.
    pub fn room_of(&self, user_id: &UserId) -> Option<&RoomId> {
        self.members.get(user_id)
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.members.contains_key(user_id)
    }

    /// Replaces the board and turn flag verbatim.
    ///
    /// Returns the updated room so the caller can fan the move out, or
    /// `None` if the room is gone (the move is dropped).
    pub fn apply_move(
        &mut self,
        room_id: &RoomId,
        board: Board,
        turn_is_first: bool,
    ) -> Option<&Room> {
        let Some(room) = self.rooms.get_mut(room_id) else {
            tracing::debug!(%room_id, "move for unknown room dropped");
            return None;
        };
        room.board = board;
        room.turn_is_first = turn_is_first;
        Some(room)
    }

    /// Takes a room out of the live set. Idempotent.
    pub fn remove(&mut self, room_id: &RoomId) -> Option<Room> {
        let room = self.rooms.remove(room_id)?;
        for member in &room.users {
            // Only unlink entries that still point at this room.
            if self.members.get(&member.user_id) == Some(room_id) {
                self.members.remove(&member.user_id);
            }
        }
        tracing::info!(%room_id, "room removed");
        Some(room)
    }

    /// Claims a room because `leaving` walked out of it.
    ///
    /// Returns `None` without touching anything if the room is already
    /// gone or `leaving` is not one of its members.
    pub fn member_left(
        &mut self,
        room_id: &RoomId,
        leaving: &UserId,
    ) -> Option<Departure> {
        let room = self.rooms.get(room_id)?;
        let Some(remaining) = room.opponent_of(leaving).cloned() else {
            tracing::debug!(
                %room_id,
                user_id = %leaving,
                "leave from non-member ignored"
            );
            return None;
        };
        let room = self.remove(room_id)?;
        let leaving = room
            .users
            .iter()
            .find(|m| m.user_id == *leaving)
            .cloned()?;
        Some(Departure {
            room,
            leaving,
            remaining,
        })
    }

    /// Generates an id that is not currently live.
    pub fn next_room_id(&self) -> RoomId {
        loop {
            let id = generate_room_id();
            if !self.rooms.contains_key(&id) {
                return id;
            }
        }
    }

    /// Number of live rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

/// Generates a random 32-character hex room id (128 bits of entropy).
pub fn generate_room_id() -> RoomId {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    RoomId(bytes.iter().map(|b| format!("{b:02x}")).collect())
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_protocol::{EMPTY_BOARD, Mark};

    fn alice() -> Member {
        Member::new("1", "Alice")
    }

    fn bob() -> Member {
        Member::new("2", "Bob")
    }

    fn carol() -> Member {
        Member::new("3", "Carol")
    }

    fn rid(id: &str) -> RoomId {
        RoomId::new(id)
    }

    fn manager_with_r1() -> RoomManager {
        let mut mgr = RoomManager::new();
        mgr.create(rid("r1"), bob(), alice()).unwrap();
        mgr
    }

    // =====================================================================
    // create()
    // =====================================================================

    #[test]
    fn test_create_room_has_empty_board_and_x_to_move() {
        let mut mgr = RoomManager::new();

        let room = mgr.create(rid("r1"), bob(), alice()).unwrap();

        assert_eq!(room.board, EMPTY_BOARD);
        assert!(room.turn_is_first);
        assert_eq!(room.users, [bob(), alice()]);
        assert_eq!(mgr.len(), 1);
        assert_eq!(mgr.room_of(&alice().user_id), Some(&rid("r1")));
        assert_eq!(mgr.room_of(&bob().user_id), Some(&rid("r1")));
    }

    #[test]
    fn test_create_duplicate_id_is_rejected_not_overwritten() {
        let mut mgr = manager_with_r1();
        mgr.apply_move(&rid("r1"), [Some(Mark::X); 9], false);

        let result = mgr.create(rid("r1"), carol(), Member::new("4", "Dan"));

        assert!(matches!(
            result,
            Err(RoomError::Duplicate(id)) if id == rid("r1")
        ));
        assert_eq!(mgr.get(&rid("r1")).unwrap().board, [Some(Mark::X); 9]);
        assert!(!mgr.is_member(&carol().user_id));
    }

    #[test]
    fn test_create_member_already_playing_is_conflict() {
        let mut mgr = manager_with_r1();

        let result = mgr.create(rid("r2"), carol(), alice());

        assert!(matches!(
            result,
            Err(RoomError::Conflict(u)) if u == alice().user_id
        ));
        assert_eq!(mgr.len(), 1);
        assert!(
            !mgr.is_member(&carol().user_id),
            "failed create must not seat anyone"
        );
    }

    #[test]
    fn test_create_against_self_is_rejected() {
        let mut mgr = RoomManager::new();
        let result = mgr.create(rid("r1"), alice(), alice());
        assert!(matches!(result, Err(RoomError::SelfMatch(_))));
        assert!(mgr.is_empty());
    }

    // =====================================================================
    // apply_move()
    // =====================================================================

    #[test]
    fn test_apply_move_replaces_board_verbatim() {
        let mut mgr = manager_with_r1();
        let mut board = EMPTY_BOARD;
        board[0] = Some(Mark::X);

        let room = mgr.apply_move(&rid("r1"), board, false).unwrap();

        assert_eq!(room.board, board);
        assert!(!room.turn_is_first);
    }

    #[test]
    fn test_apply_move_trusts_out_of_turn_boards() {
        // No legality check: two O's on an otherwise empty board are kept.
        let mut mgr = manager_with_r1();
        let mut board = EMPTY_BOARD;
        board[3] = Some(Mark::O);
        board[4] = Some(Mark::O);

        let room = mgr.apply_move(&rid("r1"), board, true).unwrap();

        assert_eq!(room.board, board);
    }

    #[test]
    fn test_apply_move_unknown_room_is_noop() {
        let mut mgr = manager_with_r1();
        assert!(mgr.apply_move(&rid("nope"), EMPTY_BOARD, false).is_none());
        assert_eq!(mgr.len(), 1);
    }

    // =====================================================================
    // remove() / member_left()
    // =====================================================================

    #[test]
    fn test_remove_is_idempotent_and_frees_members() {
        let mut mgr = manager_with_r1();

        assert!(mgr.remove(&rid("r1")).is_some());
        assert!(mgr.remove(&rid("r1")).is_none());
        assert!(!mgr.is_member(&alice().user_id));
        assert!(!mgr.is_member(&bob().user_id));

        // Both are free to play again.
        assert!(mgr.create(rid("r2"), alice(), bob()).is_ok());
    }

    #[test]
    fn test_member_left_claims_room_and_names_remaining_winner() {
        let mut mgr = manager_with_r1();

        let departure = mgr.member_left(&rid("r1"), &bob().user_id).unwrap();

        assert_eq!(departure.leaving, bob());
        assert_eq!(departure.remaining, alice());
        assert_eq!(departure.room.room_id, rid("r1"));
        assert!(mgr.get(&rid("r1")).is_none());
        assert!(!mgr.is_member(&alice().user_id));
    }

    #[test]
    fn test_member_left_twice_claims_once() {
        let mut mgr = manager_with_r1();

        assert!(mgr.member_left(&rid("r1"), &bob().user_id).is_some());
        assert!(mgr.member_left(&rid("r1"), &alice().user_id).is_none());
        assert!(mgr.remove(&rid("r1")).is_none());
    }

    #[test]
    fn test_member_left_by_stranger_is_ignored() {
        let mut mgr = manager_with_r1();

        assert!(mgr.member_left(&rid("r1"), &carol().user_id).is_none());
        assert!(mgr.get(&rid("r1")).is_some());
    }

    // =====================================================================
    // ids
    // =====================================================================

    #[test]
    fn test_generate_room_id_is_32_hex_chars_and_unique() {
        let a = generate_room_id();
        let b = generate_room_id();
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_next_room_id_is_not_live() {
        let mgr = manager_with_r1();
        let id = mgr.next_room_id();
        assert!(mgr.get(&id).is_none());
    }
}
