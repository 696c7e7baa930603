//! Signed, timestamped, single-purpose link tokens.
//!
//! Email-confirmation and password-reset links carry an opaque URL-safe token
//! of the form `payload.timestamp.signature`: a base64url JSON payload, a
//! base64url big-endian unix timestamp, and a base64url HMAC-SHA256 over the
//! first two parts. These are deliberately not JWTs; they share nothing with
//! the session tokens except the secret key.
//!
//! Verification fails closed: any malformed part, any signature mismatch, or
//! an age beyond the allowed window all come back as `None`. Callers treat
//! `None` as a normal "no", never as a fault.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;

use crate::auth::config::AuthConfig;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, Debug)]
pub struct SignedTokenCodec {
    secret_key: String,
    salt: String,
}

impl SignedTokenCodec {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            secret_key: config.secret_key().expose_secret().to_string(),
            salt: config.signed_token_salt().to_string(),
        }
    }

    /// Sign a payload with the current timestamp embedded.
    pub fn generate<T: Serialize>(&self, payload: &T) -> Result<String> {
        self.sign_at(payload, Utc::now().timestamp())
    }

    pub(crate) fn sign_at<T: Serialize>(&self, payload: &T, timestamp: i64) -> Result<String> {
        let json = serde_json::to_vec(payload).context("failed to serialize token payload")?;
        let payload_part = URL_SAFE_NO_PAD.encode(json);
        let timestamp_part = URL_SAFE_NO_PAD.encode(timestamp.to_be_bytes());
        let signing_input = format!("{payload_part}.{timestamp_part}");
        let signature = self.signature(&signing_input);
        Ok(format!("{signing_input}.{signature}"))
    }

    /// Decode and authenticate a token, rejecting anything older than
    /// `max_age_seconds`. Age exactly at the limit still passes.
    #[must_use]
    pub fn verify<T: DeserializeOwned>(&self, token: &str, max_age_seconds: i64) -> Option<T> {
        let mut parts = token.splitn(3, '.');
        let payload_part = parts.next()?;
        let timestamp_part = parts.next()?;
        let signature_part = parts.next()?;

        let signing_input = format!("{payload_part}.{timestamp_part}");
        let signature = URL_SAFE_NO_PAD.decode(signature_part).ok()?;
        let mut mac = self.mac(&signing_input);
        mac.verify_slice(&signature).ok()?;

        let timestamp_bytes = URL_SAFE_NO_PAD.decode(timestamp_part).ok()?;
        let timestamp = i64::from_be_bytes(timestamp_bytes.try_into().ok()?);
        let age = Utc::now().timestamp() - timestamp;
        if age > max_age_seconds {
            return None;
        }

        let json = URL_SAFE_NO_PAD.decode(payload_part).ok()?;
        serde_json::from_slice(&json).ok()
    }

    fn signature(&self, signing_input: &str) -> String {
        URL_SAFE_NO_PAD.encode(self.mac(signing_input).finalize().into_bytes())
    }

    fn mac(&self, signing_input: &str) -> HmacSha256 {
        // Key derivation namespaces the shared secret by salt, so a token
        // signed for one purpose never verifies for another.
        let mut key_mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .unwrap_or_else(|_| unreachable!("hmac accepts keys of any length"));
        key_mac.update(self.salt.as_bytes());
        let key = key_mac.finalize().into_bytes();

        let mut mac = HmacSha256::new_from_slice(&key)
            .unwrap_or_else(|_| unreachable!("hmac accepts keys of any length"));
        mac.update(signing_input.as_bytes());
        mac
    }
}
