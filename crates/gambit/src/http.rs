//! Out-of-band HTTP surface: room lookups, reported results, presence,
//! and a liveness probe.
//!
//! ```text
//! GET  /room-board/:room_id    → Room JSON, or 404
//! POST /game-completed         → true
//! GET  /active-users           → [PresenceEntry]
//! GET  /check-server-status    → {"active": true}
//! ```

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use gambit_presence::IdentityProvider;
use gambit_protocol::{GameReport, PresenceEntry, RoomId};
use gambit_room::{Outcome, PersistenceSink, Room, RoomError};
use serde_json::{Value, json};

use crate::coordinator::Coordinator;

/// Error responses carry a JSON body with a `message` field.
pub type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(json!({ "message": message })))
}

fn room_error(e: RoomError) -> ApiError {
    match &e {
        RoomError::NotFound(_) => {
            api_error(StatusCode::NOT_FOUND, "Room not found")
        }
        RoomError::Duplicate(_) | RoomError::Conflict(_) => {
            api_error(StatusCode::CONFLICT, &e.to_string())
        }
        RoomError::SelfMatch(_) => {
            api_error(StatusCode::BAD_REQUEST, &e.to_string())
        }
    }
}

/// Builds the HTTP router over a shared coordinator.
pub fn router<I, P>(coordinator: Arc<Coordinator<I, P>>) -> Router
where
    I: IdentityProvider,
    P: PersistenceSink,
{
    Router::new()
        .route("/room-board/:room_id", get(room_board::<I, P>))
        .route("/game-completed", post(game_completed::<I, P>))
        .route("/active-users", get(active_users::<I, P>))
        .route("/check-server-status", get(check_server_status))
        .with_state(coordinator)
}

/// Current state of a live room.
pub async fn room_board<I, P>(
    State(coordinator): State<Arc<Coordinator<I, P>>>,
    Path(room_id): Path<RoomId>,
) -> Result<Json<Room>, ApiError>
where
    I: IdentityProvider,
    P: PersistenceSink,
{
    coordinator.room(&room_id).await.map(Json).map_err(room_error)
}

/// Records a finished game reported by a client.
///
/// Idempotent: a report for a room that is already finalized (or never
/// existed) is accepted and ignored.
pub async fn game_completed<I, P>(
    State(coordinator): State<Arc<Coordinator<I, P>>>,
    Json(report): Json<GameReport>,
) -> Result<Json<bool>, ApiError>
where
    I: IdentityProvider,
    P: PersistenceSink,
{
    let outcome = Outcome::from_report(report.is_winner, report.winner_id);
    let Some(outcome) = outcome else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "winnerId is required when isWinner is true",
        ));
    };

    let recorded = coordinator
        .finalize(
            &report.room_id,
            outcome,
            report.board,
            report.challenger,
            report.challenged_to,
        )
        .await;
    if !recorded {
        tracing::debug!(
            room_id = %report.room_id,
            "duplicate game report ignored"
        );
    }
    Ok(Json(true))
}

pub async fn active_users<I, P>(
    State(coordinator): State<Arc<Coordinator<I, P>>>,
) -> Json<Vec<PresenceEntry>>
where
    I: IdentityProvider,
    P: PersistenceSink,
{
    Json(coordinator.active_users().await)
}

pub async fn check_server_status() -> Json<Value> {
    Json(json!({ "active": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_presence::{LoginClaim, TrustedIdentity};
    use gambit_protocol::{ConnectionId, EMPTY_BOARD, Mark, Member, UserId};
    use gambit_room::MemorySink;

    type TestCoordinator = Coordinator<TrustedIdentity, MemorySink>;

    async fn with_room() -> Arc<TestCoordinator> {
        let c = Arc::new(Coordinator::new(TrustedIdentity, MemorySink::new()));
        c.accept_challenge(
            ConnectionId::new(1),
            RoomId::new("r1"),
            Member::new("A", "Alice"),
            Member::new("B", "Bob"),
        )
        .await
        .unwrap();
        c
    }

    fn report(is_winner: bool, winner: Option<&str>) -> GameReport {
        let mut board = EMPTY_BOARD;
        board[0] = Some(Mark::X);
        GameReport {
            room_id: RoomId::new("r1"),
            winner_id: winner.map(UserId::new),
            is_winner,
            board,
            challenger: UserId::new("A"),
            challenged_to: UserId::new("B"),
        }
    }

    #[tokio::test]
    async fn test_room_board_existing_room_returns_it() {
        let c = with_room().await;

        let Json(room) =
            room_board(State(c), Path(RoomId::new("r1"))).await.unwrap();

        assert_eq!(room.board, EMPTY_BOARD);
        assert!(room.turn_is_first);
    }

    #[tokio::test]
    async fn test_room_board_unknown_room_is_404() {
        let c = with_room().await;

        let (status, Json(body)) =
            room_board(State(c), Path(RoomId::new("nope")))
                .await
                .unwrap_err();

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "message": "Room not found" }));
    }

    #[test]
    fn test_room_error_maps_to_status() {
        let cases = [
            (RoomError::NotFound(RoomId::new("r")), StatusCode::NOT_FOUND),
            (RoomError::Duplicate(RoomId::new("r")), StatusCode::CONFLICT),
            (RoomError::Conflict(UserId::new("A")), StatusCode::CONFLICT),
            (
                RoomError::SelfMatch(UserId::new("A")),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (error, expected) in cases {
            let (status, _) = room_error(error);
            assert_eq!(status, expected);
        }
    }

    #[tokio::test]
    async fn test_game_completed_records_once() {
        let c = with_room().await;

        let bob_won = || Json(report(true, Some("B")));
        let Json(first) = game_completed(State(Arc::clone(&c)), bob_won())
            .await
            .unwrap();
        let Json(second) = game_completed(State(Arc::clone(&c)), bob_won())
            .await
            .unwrap();

        assert!(first && second);
        let games = c.sink().games().await;
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].winner_id, Some(UserId::new("B")));
        assert_eq!(games[0].board[0], Some(Mark::X));
        assert_eq!(c.sink().stats_for(&UserId::new("B")).await.games_won, 1);
        assert_eq!(c.sink().stats_for(&UserId::new("A")).await.games_lost, 1);
        assert!(c.room(&RoomId::new("r1")).await.is_err());
    }

    #[tokio::test]
    async fn test_game_completed_not_winner_is_draw() {
        let c = with_room().await;

        game_completed(State(Arc::clone(&c)), Json(report(false, None)))
            .await
            .unwrap();

        let games = c.sink().games().await;
        assert!(games[0].is_draw);
        assert_eq!(games[0].winner_id, None);
        assert_eq!(c.sink().stats_for(&UserId::new("A")).await.points, 1);
        assert_eq!(c.sink().stats_for(&UserId::new("B")).await.points, 1);
    }

    #[tokio::test]
    async fn test_game_completed_winner_without_id_is_400() {
        let c = with_room().await;

        let (status, _) =
            game_completed(State(Arc::clone(&c)), Json(report(true, None)))
                .await
                .unwrap_err();

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(c.room(&RoomId::new("r1")).await.is_ok());
    }

    #[tokio::test]
    async fn test_active_users_lists_presence() {
        let c = Arc::new(Coordinator::new(TrustedIdentity, MemorySink::new()));
        let _rx = c.connect(ConnectionId::new(1)).await;
        c.login(
            ConnectionId::new(1),
            LoginClaim {
                id: UserId::new("A"),
                full_name: "Alice".into(),
            },
        )
        .await
        .unwrap();

        let Json(users) = active_users(State(c)).await;

        assert_eq!(users.len(), 1);
        assert_eq!(users[0].display_name, "Alice");
    }

    #[tokio::test]
    async fn test_check_server_status_is_active() {
        let Json(body) = check_server_status().await;
        assert_eq!(body, json!({ "active": true }));
    }
}
