//! Wire protocol for Gambit.
//!
//! This crate defines the "language" clients and the server speak:
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`Board`], ids): the
//!   structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those events are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]): what can go wrong doing so.
//!
//! The protocol layer knows nothing about presence or rooms; it only
//! describes and (de)serializes events.
//!
//! ```text
//! Transport (bytes) → Protocol (events) → Coordinator (presence, rooms)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use gambit_transport::ConnectionId;
pub use types::{
    Board, ClientEvent, EMPTY_BOARD, GameReport, Mark, Member, PendingChallenge,
    PresenceEntry, RoomId, ServerEvent, UserId,
};
