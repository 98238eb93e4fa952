//! Finished games and the statistics they produce.

use std::time::{SystemTime, UNIX_EPOCH};

use gambit_protocol::{Board, RoomId, UserId};
use serde::{Deserialize, Serialize};

/// How a match ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Win { winner: UserId },
    Draw,
}

impl Outcome {
    /// Builds an outcome from the `isWinner` / `winnerId` pair clients
    /// report. `None` when a decisive result names no winner.
    pub fn from_report(
        is_winner: bool,
        winner_id: Option<UserId>,
    ) -> Option<Self> {
        if !is_winner {
            return Some(Self::Draw);
        }
        winner_id.map(|winner| Self::Win { winner })
    }

    pub fn winner(&self) -> Option<&UserId> {
        match self {
            Self::Win { winner } => Some(winner),
            Self::Draw => None,
        }
    }
}

/// The durable record of one finished match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedGame {
    pub room_id: RoomId,
    pub winner_id: Option<UserId>,
    pub is_draw: bool,
    pub board: Board,
    /// The challenger.
    pub player1_id: UserId,
    /// The challenged party.
    pub player2_id: UserId,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl CompletedGame {
    /// Stamps a result with the current time.
    pub fn new(
        room_id: RoomId,
        outcome: &Outcome,
        board: Board,
        challenger: UserId,
        challenged: UserId,
    ) -> Self {
        Self {
            room_id,
            winner_id: outcome.winner().cloned(),
            is_draw: matches!(outcome, Outcome::Draw),
            board,
            player1_id: challenger,
            player2_id: challenged,
            timestamp: unix_millis(),
        }
    }
}

/// Increments applied to one participant's totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatDelta {
    pub games_played: u32,
    pub games_won: u32,
    pub games_lost: u32,
    pub games_drawn: u32,
    pub points: u32,
}

impl StatDelta {
    pub const WIN: Self = Self {
        games_played: 1,
        games_won: 1,
        games_lost: 0,
        games_drawn: 0,
        points: 2,
    };

    pub const LOSS: Self = Self {
        games_played: 1,
        games_won: 0,
        games_lost: 1,
        games_drawn: 0,
        points: 0,
    };

    pub const DRAW: Self = Self {
        games_played: 1,
        games_won: 0,
        games_lost: 0,
        games_drawn: 1,
        points: 1,
    };
}

/// Per-participant deltas for a finished game.
///
/// A draw credits both players. A decisive game credits the winner and
/// charges whichever participant is not the winner: if the winner is the
/// challenger, the challenged party lost, and vice versa.
pub fn stat_deltas(game: &CompletedGame) -> Vec<(UserId, StatDelta)> {
    match (&game.winner_id, game.is_draw) {
        (Some(winner), false) => {
            let loser = if *winner == game.player1_id {
                &game.player2_id
            } else {
                &game.player1_id
            };
            vec![
                (winner.clone(), StatDelta::WIN),
                (loser.clone(), StatDelta::LOSS),
            ]
        }
        _ => vec![
            (game.player1_id.clone(), StatDelta::DRAW),
            (game.player2_id.clone(), StatDelta::DRAW),
        ],
    }
}

/// Running totals for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub games_played: u32,
    pub games_won: u32,
    pub games_lost: u32,
    pub games_drawn: u32,
    pub points: u32,
}

impl PlayerStats {
    pub fn apply(&mut self, delta: StatDelta) {
        self.games_played += delta.games_played;
        self.games_won += delta.games_won;
        self.games_lost += delta.games_lost;
        self.games_drawn += delta.games_drawn;
        self.points += delta.points;
    }
}

/// Milliseconds since the Unix epoch, or 0 if the clock is before it.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
