//! Authentication and session-security core.
//!
//! Transport-agnostic: everything here returns [`AuthError`] kinds and
//! leaves HTTP semantics to the adapter in `crate::api`.

pub mod config;
pub mod error;
pub mod jwt;
pub mod kv;
pub mod notify;
pub mod password;
pub mod service;
pub mod signed;
pub mod store;
pub mod throttle;

pub use config::{AuthConfig, HashAlgorithm};
pub use error::AuthError;
pub use jwt::{Claims, JwtCodec, TokenPair, TokenType};
pub use kv::{KvStore, MemoryKv};
pub use notify::{EmailSender, EmailTask, LogEmailSender, Notifier, RetryConfig, SpawnNotifier};
pub use password::PasswordHasher;
pub use service::{normalize_email, AuthService, Identity, ResendOutcome};
pub use signed::SignedTokenCodec;
pub use store::{InsertOutcome, MemoryUserStore, NewUser, PgUserStore, UserRecord, UserStore};
pub use throttle::{LoginThrottle, ThrottleDecision};
