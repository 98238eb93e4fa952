//! Presence tracking for Gambit.
//!
//! This crate knows who is online and how to reach them:
//!
//! 1. **Identity**: resolving a login claim to a user ([`IdentityProvider`])
//! 2. **Presence**: which user sits behind which connection
//!    ([`PresenceRegistry`])
//! 3. **Delivery**: an outbound channel per open connection ([`ConnectionHub`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Coordinator (above)  ← resolves users to connections for every notification
//!     ↕
//! Presence Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← provides UserId, PresenceEntry, ServerEvent
//! ```
//!
//! Neither [`PresenceRegistry`] nor [`ConnectionHub`] locks internally.
//! They are owned by the coordinator and mutated behind its mutexes.

mod error;
mod hub;
mod identity;
mod registry;

pub use error::IdentityError;
pub use hub::{ConnectionHub, OutboundReceiver, OutboundSender};
pub use identity::{IdentityProvider, LoginClaim, TrustedIdentity};
pub use registry::PresenceRegistry;
