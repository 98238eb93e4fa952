//! Challenge negotiation: propose, accept, decline.
//!
//! A challenge is never stored. `sendChallenge` hands the opponent a
//! freshly generated room id; `acceptChallenge` brings that id back and
//! the room is created then. Declines and disconnects simply let the
//! proposal lapse.

use gambit_presence::IdentityProvider;
use gambit_protocol::{
    ConnectionId, Member, PendingChallenge, RoomId, ServerEvent, UserId,
};
use gambit_room::{PersistenceSink, Room, RoomError};

use crate::coordinator::{CODE_BAD_REQUEST, CODE_CONFLICT, Coordinator};

/// Told to the challenger when either party is mid-match.
pub const MSG_IN_ANOTHER_ROOM: &str = "Player is in another room";
/// Told to the accepting party when a room could not be created because
/// someone is already playing.
pub const MSG_JOINED_ANOTHER_ROOM: &str = "Player joined another room.";

impl<I: IdentityProvider, P: PersistenceSink> Coordinator<I, P> {
    /// Proposes a match to `opponent_id`.
    ///
    /// Refused with [`RoomError::Conflict`] (and `alreadyInRoom` to the
    /// sender) if either party is playing. If the opponent is not online
    /// the challenge is dropped and `Ok(None)` comes back.
    pub async fn send_challenge(
        &self,
        origin: ConnectionId,
        opponent_id: UserId,
        challenger: Member,
    ) -> Result<Option<PendingChallenge>, RoomError> {
        let rooms = self.rooms.lock().await;
        if let Some(busy) = [&opponent_id, &challenger.user_id]
            .into_iter()
            .find(|user_id| rooms.is_member(user_id))
        {
            tracing::debug!(
                %origin,
                user_id = %busy,
                "challenge refused, player busy"
            );
            self.hub.lock().await.send_to(
                origin,
                ServerEvent::AlreadyInRoom {
                    message: MSG_IN_ANOTHER_ROOM.into(),
                },
            );
            return Err(RoomError::Conflict(busy.clone()));
        }
        let proposed_room_id = rooms.next_room_id();

        let presence = self.presence.lock().await;
        let Some(target) = presence.connection_of(&opponent_id) else {
            tracing::debug!(
                %origin,
                opponent = %opponent_id,
                "challenge to offline user dropped"
            );
            return Ok(None);
        };
        self.hub.lock().await.send_to(
            target,
            ServerEvent::ReceiveChallenge {
                challenger: challenger.clone(),
                room_id: proposed_room_id.clone(),
            },
        );

        tracing::info!(
            challenger = %challenger.user_id,
            opponent = %opponent_id,
            room_id = %proposed_room_id,
            "challenge sent"
        );
        Ok(Some(PendingChallenge {
            challenger_id: challenger.user_id,
            challenger_name: challenger.display_name,
            opponent_id,
            proposed_room_id,
        }))
    }

    /// Accepts a challenge and opens the room.
    ///
    /// The membership check and the room insert are one step under the
    /// rooms lock. On success both players get `challengeAccepted`.
    ///
    /// # Errors
    /// - [`RoomError::Conflict`]: a player is already in a room;
    ///   `alreadyInRoom` goes to the sender
    /// - [`RoomError::Duplicate`]: the room id is live; `error` 409
    /// - [`RoomError::SelfMatch`]: `error` 400
    pub async fn accept_challenge(
        &self,
        origin: ConnectionId,
        room_id: RoomId,
        challenger: Member,
        challenged_to: Member,
    ) -> Result<Room, RoomError> {
        let mut rooms = self.rooms.lock().await;
        let created =
            rooms.create(room_id, challenged_to.clone(), challenger.clone());
        let room = match created {
            Ok(room) => room.clone(),
            Err(e) => {
                let reply = match &e {
                    RoomError::Conflict(_) => ServerEvent::AlreadyInRoom {
                        message: MSG_JOINED_ANOTHER_ROOM.into(),
                    },
                    RoomError::Duplicate(_) => ServerEvent::Error {
                        code: CODE_CONFLICT,
                        message: e.to_string(),
                    },
                    RoomError::SelfMatch(_) | RoomError::NotFound(_) => {
                        ServerEvent::Error {
                            code: CODE_BAD_REQUEST,
                            message: e.to_string(),
                        }
                    }
                };
                tracing::debug!(%origin, error = %e, "accept refused");
                self.hub.lock().await.send_to(origin, reply);
                return Err(e);
            }
        };

        let presence = self.presence.lock().await;
        let mut targets = vec![origin];
        for member in &room.users {
            let Some(connection_id) = presence.connection_of(&member.user_id)
            else {
                continue;
            };
            if !targets.contains(&connection_id) {
                targets.push(connection_id);
            }
        }

        let hub = self.hub.lock().await;
        let event = ServerEvent::ChallengeAccepted {
            room_id: room.room_id.clone(),
            challenger,
            challenged_to,
        };
        for connection_id in targets {
            hub.send_to(connection_id, event.clone());
        }
        Ok(room)
    }

    /// Tells the challenger their challenge was turned down. Returns
    /// `false` if the challenger is no longer online.
    pub async fn decline_challenge(
        &self,
        challenger: Member,
        challenged_to: Member,
    ) -> bool {
        let presence = self.presence.lock().await;
        let Some(target) = presence.connection_of(&challenger.user_id) else {
            tracing::debug!(
                challenger = %challenger.user_id,
                "decline for offline challenger dropped"
            );
            return false;
        };
        tracing::info!(
            challenger = %challenger.user_id,
            challenged = %challenged_to.user_id,
            "challenge declined"
        );
        self.hub.lock().await.send_to(
            target,
            ServerEvent::ChallengeDeclined {
                challenger,
                challenged_to,
            },
        )
    }
}
