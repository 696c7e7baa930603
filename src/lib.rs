//! # Torgi (Marketplace Auth Service)
//!
//! `torgi` is the authentication and session-security core of a marketplace
//! backend, exposed over an HTTP API.
//!
//! ## Sessions (JWT)
//!
//! Logins mint a short-lived `access` JWT plus a long-lived `refresh` JWT;
//! the `type` claim tells them apart and every operation enforces the type it
//! expects. Tokens are stateless and carry the admin flag only when set.
//! The refresh token travels in an `HttpOnly` cookie.
//!
//! ## Account links (signed tokens)
//!
//! Email-confirmation and password-reset links carry a separate HMAC-signed,
//! timestamped token format with a one-day validity window. Reset tokens are
//! single-use; redeemed tokens are remembered in the key/value store until
//! they would have expired anyway.
//!
//! ## Abuse protection
//!
//! Failed logins feed a per-account counter with sliding expiry; passing the
//! limit locks the account out (HTTP 429 with `Retry-After`) until the
//! counter expires or a successful login clears it. Password-reset requests
//! answer identically for known and unknown emails to prevent account
//! enumeration.

pub mod api;
pub mod auth;
pub mod cli;
