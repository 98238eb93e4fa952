//! The coordinator: shared state behind every connection.
//!
//! One `Coordinator` exists per server and is shared by all connection
//! tasks and the HTTP surface through an `Arc`. It owns three pieces of
//! state, each behind its own Tokio mutex:
//!
//! ```text
//! rooms    → RoomManager       (live matches + membership index)
//! presence → PresenceRegistry  (who is online, on which connection)
//! hub      → ConnectionHub     (outbound channel per open connection)
//! ```
//!
//! # Locking
//!
//! Locks are always taken in the order rooms → presence → hub, and never
//! held across an identity or persistence call. Room mutations fan out
//! while the rooms lock is still held, so everything that happens to one
//! room is seen in one order by everyone.
//!
//! Challenge negotiation lives in `challenge.rs` as a second `impl`
//! block on the same type.

use gambit_presence::{
    ConnectionHub, IdentityError, IdentityProvider, LoginClaim,
    OutboundReceiver, PresenceRegistry,
};
use gambit_protocol::{
    Board, ConnectionId, PresenceEntry, RoomId, ServerEvent, UserId,
};
use gambit_room::{
    CompletedGame, Outcome, PersistenceSink, ProfileVisit, Room, RoomError,
    RoomManager, stat_deltas,
};
use tokio::sync::Mutex;

/// HTTP-style status sent in `error` events for refused logins.
pub const CODE_UNAUTHORIZED: u16 = 401;
/// Status for requests that would clash with existing state.
pub const CODE_CONFLICT: u16 = 409;
/// Status for requests that can never succeed as sent.
pub const CODE_BAD_REQUEST: u16 = 400;

/// Presence, challenge, and room coordination for one server.
pub struct Coordinator<I: IdentityProvider, P: PersistenceSink> {
    pub(crate) rooms: Mutex<RoomManager>,
    pub(crate) presence: Mutex<PresenceRegistry>,
    pub(crate) hub: Mutex<ConnectionHub>,
    identity: I,
    sink: P,
}

impl<I: IdentityProvider, P: PersistenceSink> Coordinator<I, P> {
    pub fn new(identity: I, sink: P) -> Self {
        Self {
            rooms: Mutex::new(RoomManager::new()),
            presence: Mutex::new(PresenceRegistry::new()),
            hub: Mutex::new(ConnectionHub::new()),
            identity,
            sink,
        }
    }

    /// The persistence sink results are forwarded to.
    pub fn sink(&self) -> &P {
        &self.sink
    }

    // =====================================================================
    // Connections and presence
    // =====================================================================

    /// Opens delivery for a new connection and queues the current
    /// presence set for it.
    pub async fn connect(
        &self,
        connection_id: ConnectionId,
    ) -> OutboundReceiver {
        let presence = self.presence.lock().await;
        let mut hub = self.hub.lock().await;
        let rx = hub.attach(connection_id);
        hub.send_to(
            connection_id,
            ServerEvent::ActiveUsers(presence.list_active()),
        );
        tracing::debug!(
            %connection_id,
            open = hub.len(),
            "connection attached"
        );
        rx
    }

    /// Resolves a login claim and makes the user present on
    /// `connection_id`. Every open connection then gets the new presence
    /// set.
    ///
    /// A refused claim is answered with an `error` event (401) and leaves
    /// presence untouched.
    pub async fn login(
        &self,
        connection_id: ConnectionId,
        claim: LoginClaim,
    ) -> Result<PresenceEntry, IdentityError> {
        let member = match self.identity.resolve(claim).await {
            Ok(member) => member,
            Err(e) => {
                tracing::info!(%connection_id, error = %e, "login refused");
                self.notify(
                    connection_id,
                    ServerEvent::Error {
                        code: CODE_UNAUTHORIZED,
                        message: e.to_string(),
                    },
                )
                .await;
                return Err(e);
            }
        };

        let entry = PresenceEntry {
            user_id: member.user_id,
            display_name: member.display_name,
            connection_id,
        };
        let mut presence = self.presence.lock().await;
        let previous = presence.register(
            entry.user_id.clone(),
            entry.display_name.clone(),
            connection_id,
        );
        let replaced =
            previous.filter(|p| p.connection_id != connection_id);
        if let Some(previous) = replaced {
            tracing::info!(
                user_id = %previous.user_id,
                old = %previous.connection_id,
                new = %connection_id,
                "re-login replaced presence"
            );
        }
        self.broadcast_presence(&presence).await;
        Ok(entry)
    }

    /// Drops the presence entry for `target` (the sender's own connection
    /// when `None`). Logging out does not forfeit a running match.
    ///
    /// Only the sender's own connection can be logged out; any other id
    /// is ignored.
    pub async fn logout(
        &self,
        origin: ConnectionId,
        target: Option<ConnectionId>,
    ) -> Option<PresenceEntry> {
        let target = target.unwrap_or(origin);
        if target != origin {
            tracing::debug!(
                %origin,
                %target,
                "logout for foreign connection ignored"
            );
            return None;
        }

        let mut presence = self.presence.lock().await;
        let removed = presence.unregister(target)?;
        self.broadcast_presence(&presence).await;
        Some(removed)
    }

    /// Cleans up after a closed connection.
    ///
    /// Stops delivery, drops the user's presence, and forfeits the match
    /// of every user whose latest login came from this connection, even
    /// one who logged out on it first. A connection that was superseded
    /// by a newer login no longer speaks for the user and forfeits
    /// nothing.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let released = {
            let mut presence = self.presence.lock().await;
            let removed = presence.unregister(connection_id);
            let released = presence.release(connection_id);
            let mut hub = self.hub.lock().await;
            hub.detach(connection_id);
            if let Some(entry) = removed {
                tracing::info!(
                    %connection_id,
                    user_id = %entry.user_id,
                    "user disconnected"
                );
                hub.broadcast(&ServerEvent::ActiveUsers(
                    presence.list_active(),
                ));
            }
            released
        };

        if released.is_empty() {
            tracing::debug!(
                %connection_id,
                "anonymous or superseded connection closed"
            );
            return;
        }

        for entry in released {
            let room_id =
                self.rooms.lock().await.room_of(&entry.user_id).cloned();
            if let Some(room_id) = room_id {
                self.member_left(&room_id, &entry.user_id, &entry.display_name)
                    .await;
            }
        }
    }

    /// Snapshot of who is online.
    pub async fn active_users(&self) -> Vec<PresenceEntry> {
        self.presence.lock().await.list_active()
    }

    /// Queues one event for one connection. Fire-and-forget.
    pub async fn notify(
        &self,
        connection_id: ConnectionId,
        event: ServerEvent,
    ) -> bool {
        self.hub.lock().await.send_to(connection_id, event)
    }

    async fn broadcast_presence(&self, presence: &PresenceRegistry) {
        let event = ServerEvent::ActiveUsers(presence.list_active());
        let delivered = self.hub.lock().await.broadcast(&event);
        tracing::debug!(
            present = presence.len(),
            delivered,
            "presence broadcast"
        );
    }

    // =====================================================================
    // Rooms
    // =====================================================================

    /// Copy of a live room.
    ///
    /// Rooms disappear as soon as they are finalized, so a lookup after
    /// the match ended is [`RoomError::NotFound`].
    pub async fn room(&self, room_id: &RoomId) -> Result<Room, RoomError> {
        self.rooms
            .lock()
            .await
            .get(room_id)
            .cloned()
            .ok_or_else(|| RoomError::NotFound(room_id.clone()))
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Replaces a room's board and forwards it to every member connection
    /// except `origin`. Returns `false` (and sends nothing) if the room is
    /// gone.
    pub async fn apply_move(
        &self,
        origin: ConnectionId,
        room_id: &RoomId,
        board: Board,
        is_x_next: bool,
    ) -> bool {
        let mut rooms = self.rooms.lock().await;
        let Some(room) = rooms.apply_move(room_id, board, is_x_next) else {
            return false;
        };

        let presence = self.presence.lock().await;
        let hub = self.hub.lock().await;
        for member in &room.users {
            let Some(connection_id) = presence.connection_of(&member.user_id)
            else {
                continue;
            };
            if connection_id == origin {
                continue;
            }
            hub.send_to(
                connection_id,
                ServerEvent::UpdateBoard {
                    board: room.board,
                    is_x_next: room.turn_is_first,
                },
            );
        }
        true
    }

    /// `leaving` walked out of (or dropped from) a room.
    ///
    /// The room is claimed, the other member is told with `playerLeft`, and
    /// the match is recorded as a win for whoever stayed. Returns `false`
    /// if the room was already gone or `leaving` was not in it.
    pub async fn member_left(
        &self,
        room_id: &RoomId,
        leaving: &UserId,
        leaving_name: &str,
    ) -> bool {
        let departure = {
            let mut rooms = self.rooms.lock().await;
            let Some(departure) = rooms.member_left(room_id, leaving) else {
                return false;
            };
            let presence = self.presence.lock().await;
            let remaining = &departure.remaining.user_id;
            if let Some(connection_id) = presence.connection_of(remaining) {
                self.hub.lock().await.send_to(
                    connection_id,
                    ServerEvent::PlayerLeft {
                        full_name: leaving_name.to_owned(),
                    },
                );
            }
            departure
        };

        tracing::info!(
            %room_id,
            leaving = %departure.leaving.user_id,
            winner = %departure.remaining.user_id,
            "room forfeited"
        );
        let room = departure.room;
        let outcome = Outcome::Win {
            winner: departure.remaining.user_id,
        };
        let game = CompletedGame::new(
            room.room_id.clone(),
            &outcome,
            room.board,
            room.challenger().user_id.clone(),
            room.challenged().user_id.clone(),
        );
        self.record_completion(game).await;
        true
    }

    /// Ends a match with a reported result.
    ///
    /// The room is claimed first; only the caller that claims it records
    /// anything, so a report racing a forfeit (or a repeated report) is
    /// persisted once. Returns whether this call did the recording.
    pub async fn finalize(
        &self,
        room_id: &RoomId,
        outcome: Outcome,
        board: Board,
        challenger: UserId,
        challenged: UserId,
    ) -> bool {
        if self.rooms.lock().await.remove(room_id).is_none() {
            tracing::debug!(%room_id, "room already finalized");
            return false;
        }
        let game = CompletedGame::new(
            room_id.clone(),
            &outcome,
            board,
            challenger,
            challenged,
        );
        self.record_completion(game).await;
        true
    }

    /// Writes the game, then each participant's stat delta. Failures are
    /// logged and skipped; there is no retry and no rollback.
    async fn record_completion(&self, game: CompletedGame) {
        let room_id = game.room_id.clone();
        let deltas = stat_deltas(&game);
        tracing::info!(
            %room_id,
            winner = ?game.winner_id,
            draw = game.is_draw,
            "room finalized"
        );

        if let Err(e) = self.sink.record_game(game).await {
            tracing::warn!(%room_id, error = %e, "failed to record game");
        }
        for (user_id, delta) in deltas {
            let applied = self.sink.apply_stats(user_id.clone(), delta).await;
            if let Err(e) = applied {
                tracing::warn!(
                    %room_id,
                    %user_id,
                    error = %e,
                    "failed to apply stats"
                );
            }
        }
    }

    // =====================================================================
    // Profiles
    // =====================================================================

    /// Records a profile visit and, if the visited user is online, tells
    /// them who looked.
    pub async fn profile_visit(
        &self,
        visitor_id: UserId,
        visitor_name: String,
        visited_user_id: UserId,
    ) {
        let visit = ProfileVisit::now(visitor_id, visited_user_id.clone());
        if let Err(e) = self.sink.record_profile_visit(visit).await {
            tracing::warn!(
                user_id = %visited_user_id,
                error = %e,
                "failed to record profile visit"
            );
        }

        let presence = self.presence.lock().await;
        if let Some(connection_id) = presence.connection_of(&visited_user_id) {
            self.hub.lock().await.send_to(
                connection_id,
                ServerEvent::ProfileVisit {
                    visitor_name,
                    visited_user_id,
                },
            );
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
