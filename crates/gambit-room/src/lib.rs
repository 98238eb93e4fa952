//! Room management and game completion for Gambit.
//!
//! This crate owns everything about a match once two users agree to
//! play:
//!
//! 1. **Rooms**: the live board for each match ([`Room`], [`RoomManager`])
//! 2. **Completion**: what a finished match is worth ([`CompletedGame`],
//!    [`stat_deltas`])
//! 3. **Persistence**: where results go ([`PersistenceSink`],
//!    [`MemorySink`], [`LedgerSink`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Coordinator (above)  ← claims rooms, forwards results to a sink
//!     ↕
//! Room Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← provides RoomId, Member, Board
//! ```

pub mod completion;
mod error;
mod manager;
mod room;
mod sink;

pub use completion::{
    CompletedGame, Outcome, PlayerStats, StatDelta, stat_deltas,
};
pub use error::{PersistenceError, RoomError};
pub use manager::{Departure, RoomManager, generate_room_id};
pub use room::Room;
pub use sink::{
    LedgerRecord, LedgerSink, MemorySink, PersistenceSink, ProfileVisit,
};
