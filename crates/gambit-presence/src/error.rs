//! Error types for the presence layer.

/// Errors an [`IdentityProvider`](crate::IdentityProvider) can report.
///
/// Presence operations themselves never fail: an absent user is a normal
/// outcome, not an error.
#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    /// The login claim was refused (unknown user, blank name, ...).
    #[error("login rejected: {0}")]
    Rejected(String),

    /// The identity backend could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}
