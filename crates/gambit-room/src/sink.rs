//! Where finished games, statistics, and profile visits end up.
//!
//! The coordinator never holds a lock while awaiting a sink, and it never
//! retries: a failed write is logged and the match is still over.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use gambit_protocol::UserId;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::completion::{CompletedGame, PlayerStats, StatDelta, unix_millis};
use crate::PersistenceError;

/// One user opening another user's profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileVisit {
    pub visitor_id: UserId,
    pub visited_user_id: UserId,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl ProfileVisit {
    pub fn now(visitor_id: UserId, visited_user_id: UserId) -> Self {
        Self {
            visitor_id,
            visited_user_id,
            timestamp: unix_millis(),
        }
    }
}

/// Durable storage for match results.
///
/// The futures must be `Send`: they are awaited from connection tasks.
/// Implementations can still be written as `async fn`.
pub trait PersistenceSink: Send + Sync + 'static {
    /// Appends a finished game.
    fn record_game(
        &self,
        game: CompletedGame,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Adds `delta` to the user's totals, creating them if needed.
    fn apply_stats(
        &self,
        user_id: UserId,
        delta: StatDelta,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;

    /// Upserts the visit keyed by (visitor, visited).
    fn record_profile_visit(
        &self,
        visit: ProfileVisit,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryState {
    games: Vec<CompletedGame>,
    stats: HashMap<UserId, PlayerStats>,
    visits: HashMap<(UserId, UserId), u64>,
}

/// Keeps everything in process memory. Used in development and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded game, oldest first.
    pub async fn games(&self) -> Vec<CompletedGame> {
        self.state.lock().await.games.clone()
    }

    pub async fn stats_for(&self, user_id: &UserId) -> PlayerStats {
        self.state
            .lock()
            .await
            .stats
            .get(user_id)
            .copied()
            .unwrap_or_default()
    }

    /// Visits to `user_id`'s profile, most recent first.
    pub async fn visits_to(&self, user_id: &UserId) -> Vec<ProfileVisit> {
        let state = self.state.lock().await;
        let mut visits: Vec<ProfileVisit> = state
            .visits
            .iter()
            .filter(|((_, visited), _)| visited == user_id)
            .map(|((visitor, visited), ts)| ProfileVisit {
                visitor_id: visitor.clone(),
                visited_user_id: visited.clone(),
                timestamp: *ts,
            })
            .collect();
        visits.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        visits
    }
}

impl PersistenceSink for MemorySink {
    async fn record_game(
        &self,
        game: CompletedGame,
    ) -> Result<(), PersistenceError> {
        self.state.lock().await.games.push(game);
        Ok(())
    }

    async fn apply_stats(
        &self,
        user_id: UserId,
        delta: StatDelta,
    ) -> Result<(), PersistenceError> {
        self.state
            .lock()
            .await
            .stats
            .entry(user_id)
            .or_default()
            .apply(delta);
        Ok(())
    }

    async fn record_profile_visit(
        &self,
        visit: ProfileVisit,
    ) -> Result<(), PersistenceError> {
        self.state
            .lock()
            .await
            .visits
            .insert((visit.visitor_id, visit.visited_user_id), visit.timestamp);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LedgerSink
// ---------------------------------------------------------------------------

/// One line of the ledger file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LedgerRecord {
    Game(CompletedGame),
    Stats {
        #[serde(rename = "userId")]
        user_id: UserId,
        delta: StatDelta,
    },
    ProfileVisit(ProfileVisit),
}

/// Appends every record as one JSON line to a file.
///
/// Stats are written as deltas; totals are the sum of a user's lines.
/// Writes are serialized through a mutex so lines never interleave.
#[derive(Debug)]
pub struct LedgerSink {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl LedgerSink {
    /// Opens (or creates) the ledger for appending.
    pub async fn open(
        path: impl AsRef<Path>,
    ) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        tracing::info!(path = %path.display(), "ledger opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(
        &self,
        record: &LedgerRecord,
    ) -> Result<(), PersistenceError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}

impl PersistenceSink for LedgerSink {
    async fn record_game(
        &self,
        game: CompletedGame,
    ) -> Result<(), PersistenceError> {
        self.append(&LedgerRecord::Game(game)).await
    }

    async fn apply_stats(
        &self,
        user_id: UserId,
        delta: StatDelta,
    ) -> Result<(), PersistenceError> {
        self.append(&LedgerRecord::Stats { user_id, delta }).await
    }

    async fn record_profile_visit(
        &self,
        visit: ProfileVisit,
    ) -> Result<(), PersistenceError> {
        self.append(&LedgerRecord::ProfileVisit(visit)).await
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::Outcome;
    use gambit_protocol::{EMPTY_BOARD, RoomId};
    use rand::Rng;

    fn uid(id: &str) -> UserId {
        UserId::new(id)
    }

    fn draw() -> CompletedGame {
        CompletedGame::new(
            RoomId::new("r1"),
            &Outcome::Draw,
            EMPTY_BOARD,
            uid("A"),
            uid("B"),
        )
    }

    fn temp_ledger() -> PathBuf {
        let suffix: u64 = rand::rng().random();
        std::env::temp_dir().join(format!("gambit-ledger-{suffix:016x}.jsonl"))
    }

    #[tokio::test]
    async fn test_memory_sink_records_games_in_order() {
        let sink = MemorySink::new();
        sink.record_game(draw()).await.unwrap();
        sink.record_game(draw()).await.unwrap();
        assert_eq!(sink.games().await.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_sink_upserts_stats() {
        let sink = MemorySink::new();
        sink.apply_stats(uid("A"), StatDelta::WIN).await.unwrap();
        sink.apply_stats(uid("A"), StatDelta::DRAW).await.unwrap();

        let stats = sink.stats_for(&uid("A")).await;
        assert_eq!(stats.games_played, 2);
        assert_eq!(stats.points, 3);
        let nobody = sink.stats_for(&uid("nobody")).await;
        assert_eq!(nobody, PlayerStats::default());
    }

    #[tokio::test]
    async fn test_memory_sink_profile_visit_upserts_by_pair() {
        let sink = MemorySink::new();
        let first = ProfileVisit {
            visitor_id: uid("A"),
            visited_user_id: uid("B"),
            timestamp: 1,
        };
        let again = ProfileVisit { timestamp: 5, ..first.clone() };
        let other = ProfileVisit {
            visitor_id: uid("C"),
            visited_user_id: uid("B"),
            timestamp: 3,
        };
        sink.record_profile_visit(first).await.unwrap();
        sink.record_profile_visit(other).await.unwrap();
        sink.record_profile_visit(again).await.unwrap();

        let visits = sink.visits_to(&uid("B")).await;
        let order: Vec<(&str, u64)> = visits
            .iter()
            .map(|v| (v.visitor_id.as_str(), v.timestamp))
            .collect();
        assert_eq!(order, vec![("A", 5), ("C", 3)]);
    }

    #[tokio::test]
    async fn test_ledger_sink_appends_one_line_per_record() {
        let path = temp_ledger();
        let sink = LedgerSink::open(&path).await.unwrap();

        sink.record_game(draw()).await.unwrap();
        sink.apply_stats(uid("A"), StatDelta::DRAW).await.unwrap();
        sink.record_profile_visit(ProfileVisit::now(uid("A"), uid("B")))
            .await
            .unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        let records: Vec<LedgerRecord> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), 3);
        assert!(matches!(
            &records[0],
            LedgerRecord::Game(game)
                if game.is_draw && game.room_id == RoomId::new("r1")
        ));
        assert!(matches!(
            &records[1],
            LedgerRecord::Stats { user_id, delta }
                if *user_id == uid("A") && *delta == StatDelta::DRAW
        ));
        assert!(matches!(records[2], LedgerRecord::ProfileVisit(_)));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_ledger_sink_reopen_keeps_existing_lines() {
        let path = temp_ledger();
        {
            let sink = LedgerSink::open(&path).await.unwrap();
            sink.record_game(draw()).await.unwrap();
        }
        let sink = LedgerSink::open(&path).await.unwrap();
        sink.record_game(draw()).await.unwrap();
        assert_eq!(sink.path(), path.as_path());

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text.lines().count(), 2);

        let _ = tokio::fs::remove_file(&path).await;
    }
}
