//! # Gambit
//!
//! Presence, matchmaking, and live rooms for two-player web games.
//!
//! Clients connect over WebSocket, log in, see who else is online,
//! challenge each other, and play a tic-tac-toe match whose board the
//! server keeps and relays. Finished matches are handed to a
//! [`PersistenceSink`](gambit_room::PersistenceSink) exactly once, whether
//! they end with a reported result or with a player walking away.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gambit::prelude::*;
//!
//! # async fn run() -> Result<(), GambitError> {
//! let server = gambit::GambitServerBuilder::new()
//!     .config(ServerConfig::from_env()?)
//!     .build(TrustedIdentity, MemorySink::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod challenge;
pub mod config;
mod coordinator;
mod error;
mod handler;
pub mod http;
mod server;

pub use challenge::{MSG_IN_ANOTHER_ROOM, MSG_JOINED_ANOTHER_ROOM};
pub use config::{ConfigError, ServerConfig};
pub use coordinator::{
    CODE_BAD_REQUEST, CODE_CONFLICT, CODE_UNAUTHORIZED, Coordinator,
};
pub use error::GambitError;
pub use server::{GambitServer, GambitServerBuilder};

/// Everything needed to run a server and plug in collaborators.
pub mod prelude {
    pub use crate::{Coordinator, GambitError, GambitServer, ServerConfig};
    pub use gambit_presence::{
        IdentityError, IdentityProvider, LoginClaim, TrustedIdentity,
    };
    pub use gambit_protocol::{
        Board, ClientEvent, GameReport, Mark, Member, RoomId, ServerEvent,
        UserId,
    };
    pub use gambit_room::{
        CompletedGame, LedgerSink, MemorySink, PersistenceError,
        PersistenceSink, ProfileVisit, StatDelta,
    };
}
