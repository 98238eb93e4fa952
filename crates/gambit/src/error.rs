//! Unified error type for Gambit.

use gambit_presence::IdentityError;
use gambit_protocol::ProtocolError;
use gambit_room::{PersistenceError, RoomError};
use gambit_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps every crate-specific error.
///
/// The `#[from]` conversions let `?` lift sub-crate errors into this one.
#[derive(Debug, thiserror::Error)]
pub enum GambitError {
    /// Connection-level failure (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An event could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A login claim was refused.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// A room operation was refused (conflict, duplicate, not found).
    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The HTTP listener failed.
    #[error("http server failed: {0}")]
    Http(#[source] std::io::Error),
}
