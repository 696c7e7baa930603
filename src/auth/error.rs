//! Auth error sum type.
//!
//! The auth core never speaks HTTP. Every flow returns a discriminated
//! [`AuthError`] kind and the transport adapter decides what that means on
//! the wire. Infrastructure faults travel through `Internal` unchanged.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password; the caller cannot tell which.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The account exists but is deactivated.
    #[error("account is blocked")]
    AccountBlocked,

    /// The bad-login counter for this account is over the limit.
    #[error("too many failed login attempts, retry in {retry_after_seconds}s")]
    TooManyAttempts { retry_after_seconds: u64 },

    /// Registration against an email that already has a live account.
    #[error("email is already registered")]
    DuplicateEmail,

    /// Current-password check failed during a password change.
    #[error("wrong password")]
    WrongPassword,

    /// Confirmation or reset link that is malformed, tampered with,
    /// expired, or already used. One kind for all of them.
    #[error("link is invalid or expired")]
    LinkInvalid,

    /// A structurally valid token of the wrong `type` for this operation.
    #[error("wrong token type")]
    WrongTokenType,

    /// Malformed, forged, or expired JWT.
    #[error("token is invalid")]
    TokenInvalid,

    /// A valid access token for a user without admin privileges,
    /// presented to an admin-only operation.
    #[error("admin privileges required")]
    AdminRequired,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
