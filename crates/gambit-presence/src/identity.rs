//! Identity hook for resolving who a connection belongs to.
//!
//! Gambit doesn't do accounts or passwords. A client that already signed
//! in elsewhere sends a `login` event carrying its user id and name; the
//! [`IdentityProvider`] decides what user that claim maps to. Swap in a
//! provider that checks a session store or a signed token in production;
//! [`TrustedIdentity`] is for development and tests.

use std::future::Future;

use gambit_protocol::{Member, UserId};

use crate::IdentityError;

/// What a client claims about itself in a `login` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginClaim {
    pub id: UserId,
    pub full_name: String,
}

/// Resolves a login claim to a stable user id and display name.
///
/// The returned future must be `Send`: it is awaited inside the
/// per-connection task, which Tokio may move between worker threads.
/// Implementations can still be written as `async fn`.
///
/// # Example
///
/// ```rust
/// use gambit_presence::{IdentityError, IdentityProvider, LoginClaim};
/// use gambit_protocol::Member;
///
/// /// Only lets numeric ids in.
/// struct NumericIds;
///
/// impl IdentityProvider for NumericIds {
///     async fn resolve(
///         &self,
///         claim: LoginClaim,
///     ) -> Result<Member, IdentityError> {
///         claim
///             .id
///             .as_str()
///             .parse::<u64>()
///             .map_err(|_| {
///                 IdentityError::Rejected("id must be numeric".into())
///             })?;
///         Ok(Member { user_id: claim.id, display_name: claim.full_name })
///     }
/// }
/// ```
pub trait IdentityProvider: Send + Sync + 'static {
    /// Resolves the claim, or rejects the login.
    fn resolve(
        &self,
        claim: LoginClaim,
    ) -> impl Future<Output = Result<Member, IdentityError>> + Send;
}

/// Accepts every claim verbatim, except blank ids or names.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrustedIdentity;

impl IdentityProvider for TrustedIdentity {
    async fn resolve(
        &self,
        claim: LoginClaim,
    ) -> Result<Member, IdentityError> {
        if claim.id.as_str().trim().is_empty() {
            return Err(IdentityError::Rejected("user id is blank".into()));
        }
        let display_name = claim.full_name.trim();
        if display_name.is_empty() {
            return Err(IdentityError::Rejected("full name is blank".into()));
        }
        Ok(Member {
            user_id: claim.id,
            display_name: display_name.to_owned(),
        })
    }
}
