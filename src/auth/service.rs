//! Auth orchestrator.
//!
//! [`AuthService`] composes the hasher, the two token codecs, the login
//! throttle, and the injected stores into the account flows: login, refresh,
//! registration, email confirmation, password change, and password reset.
//! It owns flow ordering and policy; transport concerns (cookies, status
//! codes) stay in the HTTP adapter.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::config::AuthConfig;
use crate::auth::error::AuthError;
use crate::auth::jwt::{JwtCodec, TokenPair, TokenType};
use crate::auth::kv::KvStore;
use crate::auth::notify::{EmailTask, Notifier};
use crate::auth::password::PasswordHasher;
use crate::auth::signed::SignedTokenCodec;
use crate::auth::store::{InsertOutcome, NewUser, UserRecord, UserStore};
use crate::auth::throttle::{LoginThrottle, ThrottleDecision};

const USED_RESET_TOKEN_PREFIX: &str = "auth_used_password_reset_token_";
const USED_RESET_TOKEN_SENTINEL: &str = "1";

const TEMPLATE_EMAIL_CONFIRM: &str = "email_confirm";
const TEMPLATE_PASSWORD_RESET: &str = "password_reset";
const TEMPLATE_PASSWORD_CHANGED: &str = "password_changed";

/// Canonical form of an email address: trimmed and lowercased. Applied
/// before every lookup, comparison, and store write.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct EmailConfirmPayload {
    user_id: i64,
    user_email: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct PasswordResetPayload {
    id: i64,
}

/// Authenticated caller extracted from a bearer access token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub is_admin: bool,
}

/// Outcome of a confirmation-email resend request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResendOutcome {
    Sent,
    AlreadyConfirmed,
}

#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    hasher: PasswordHasher,
    jwt: JwtCodec,
    signed: SignedTokenCodec,
    throttle: LoginThrottle,
    users: Arc<dyn UserStore>,
    kv: Arc<dyn KvStore>,
    notifier: Arc<dyn Notifier>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn UserStore>,
        kv: Arc<dyn KvStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            hasher: PasswordHasher::new(&config),
            jwt: JwtCodec::new(&config),
            signed: SignedTokenCodec::new(&config),
            throttle: LoginThrottle::new(&config, Arc::clone(&kv)),
            config,
            users,
            kv,
            notifier,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Exchange credentials for an access/refresh token pair.
    ///
    /// The throttle gate runs before the password comparison, so a locked
    /// account rejects even the correct password without touching the
    /// hasher.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AuthError> {
        let email = normalize_email(email);
        let user = self
            .users
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !user.is_active {
            return Err(AuthError::AccountBlocked);
        }

        if let ThrottleDecision::Locked {
            retry_after_seconds,
        } = self.throttle.check(&email).await?
        {
            return Err(AuthError::TooManyAttempts {
                retry_after_seconds,
            });
        }

        if !self.hasher.verify(password, &user.password_hash) {
            self.throttle.record_failure(&email).await?;
            return Err(AuthError::InvalidCredentials);
        }

        self.throttle.clear(&email).await?;
        info!(user_id = user.id, "login succeeded");
        self.jwt.generate_pair(user.id, user.is_admin, false)
    }

    /// Mint a fresh access token from a refresh token. The admin flag is
    /// carried over from the refresh claims, not re-read from the store.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.jwt.decode(refresh_token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(AuthError::WrongTokenType);
        }

        let user = self
            .users
            .find_by_id(claims.user_id()?)
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        if !user.is_active {
            return Err(AuthError::AccountBlocked);
        }

        self.jwt.generate_pair(user.id, claims.is_admin(), true)
    }

    /// Create an account and fire off the confirmation email.
    pub async fn register(&self, email: &str, password: &str) -> Result<UserRecord, AuthError> {
        let email = normalize_email(email);
        let user = NewUser {
            email: email.clone(),
            password_hash: self.hasher.hash(password),
        };
        let record = match self.users.insert(user).await? {
            InsertOutcome::Created(record) => record,
            InsertOutcome::DuplicateEmail => return Err(AuthError::DuplicateEmail),
        };

        info!(user_id = record.id, "user registered");
        self.send_confirmation_email(&record)?;
        Ok(record)
    }

    /// Resend the confirmation email for an authenticated user.
    pub async fn resend_confirmation(&self, user_id: i64) -> Result<ResendOutcome, AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        if user.email_confirmed {
            return Ok(ResendOutcome::AlreadyConfirmed);
        }
        self.send_confirmation_email(&user)?;
        Ok(ResendOutcome::Sent)
    }

    /// Redeem a confirmation link. Idempotent: confirming an already
    /// confirmed address succeeds again.
    pub async fn confirm_email(&self, token: &str) -> Result<(), AuthError> {
        let payload: EmailConfirmPayload = self
            .signed
            .verify(token, self.config.signed_token_max_age_seconds())
            .ok_or(AuthError::LinkInvalid)?;

        let user = self
            .users
            .find_by_id(payload.user_id)
            .await?
            .ok_or(AuthError::LinkInvalid)?;
        if user.email != normalize_email(&payload.user_email) {
            return Err(AuthError::LinkInvalid);
        }

        self.users.confirm_email(user.id).await?;
        info!(user_id = user.id, "email confirmed");
        Ok(())
    }

    /// Change the password of an authenticated user after re-checking the
    /// current one.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::TokenInvalid)?;
        if !self.hasher.verify(current_password, &user.password_hash) {
            return Err(AuthError::WrongPassword);
        }

        let hash = self.hasher.hash(new_password);
        self.users.update_password(user.id, &hash).await?;
        info!(user_id = user.id, "password changed");
        Ok(())
    }

    /// Start a password reset. Succeeds identically whether or not the
    /// email belongs to an account, so callers learn nothing about
    /// registered addresses. Outstanding tokens are not tracked; several
    /// can be live at once and each is valid until used or expired.
    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);
        let Some(user) = self.users.find_by_email(&email).await? else {
            return Ok(());
        };
        if !user.is_active {
            return Ok(());
        }

        let token = self.signed.generate(&PasswordResetPayload { id: user.id })?;
        let link = format!(
            "https://{}/api/v1/auth/password-reset-confirm/{token}",
            self.config.issuer()
        );
        self.enqueue_email(&user.email, TEMPLATE_PASSWORD_RESET, &link)?;
        Ok(())
    }

    /// Redeem a reset link and set the new password. Every failure mode
    /// (malformed, forged, expired, replayed, orphaned) collapses into
    /// `LinkInvalid`.
    pub async fn confirm_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let payload: PasswordResetPayload = self
            .signed
            .verify(token, self.config.signed_token_max_age_seconds())
            .ok_or(AuthError::LinkInvalid)?;

        let marker_key = format!("{USED_RESET_TOKEN_PREFIX}{token}");
        if self.kv.get(&marker_key).await?.is_some() {
            return Err(AuthError::LinkInvalid);
        }

        let user = self
            .users
            .find_by_id(payload.id)
            .await?
            .ok_or(AuthError::LinkInvalid)?;

        let hash = self.hasher.hash(new_password);
        self.users.update_password(user.id, &hash).await?;

        // The marker outlives the token's validity window, after which the
        // token rejects on age alone.
        let max_age = self.config.signed_token_max_age_seconds();
        let ttl = std::time::Duration::from_secs(u64::try_from(max_age).unwrap_or(0));
        self.kv
            .set(&marker_key, USED_RESET_TOKEN_SENTINEL, ttl)
            .await?;

        info!(user_id = user.id, "password reset completed");
        self.enqueue_email(&user.email, TEMPLATE_PASSWORD_CHANGED, "")?;
        Ok(())
    }

    /// Authenticate a bearer access token for a protected endpoint.
    pub fn authenticate_access(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = self.jwt.decode(token)?;
        if claims.token_type != TokenType::Access {
            return Err(AuthError::WrongTokenType);
        }
        Ok(Identity {
            user_id: claims.user_id()?,
            is_admin: claims.is_admin(),
        })
    }

    /// Like [`authenticate_access`](Self::authenticate_access) but fails
    /// closed for non-admin callers.
    pub fn authenticate_admin(&self, token: &str) -> Result<Identity, AuthError> {
        let identity = self.authenticate_access(token)?;
        if !identity.is_admin {
            return Err(AuthError::AdminRequired);
        }
        Ok(identity)
    }

    fn send_confirmation_email(&self, user: &UserRecord) -> Result<(), AuthError> {
        let payload = EmailConfirmPayload {
            user_id: user.id,
            user_email: user.email.clone(),
        };
        let token = self.signed.generate(&payload)?;
        let link = format!(
            "https://{}/api/v1/auth/email-confirm/{token}",
            self.config.issuer()
        );
        self.enqueue_email(&user.email, TEMPLATE_EMAIL_CONFIRM, &link)
    }

    fn enqueue_email(&self, to_email: &str, template: &str, link: &str) -> Result<(), AuthError> {
        let payload_json = serde_json::to_string(&serde_json::json!({ "link": link }))
            .context("failed to serialize email payload")?;
        self.notifier.enqueue(EmailTask {
            to_email: to_email.to_string(),
            template: template.to_string(),
            payload_json,
        });
        Ok(())
    }
}
