//! JWT session token codec.
//!
//! Access and refresh tokens are HS256 JWTs sharing one claim shape; the
//! `type` claim tells them apart and callers enforce it per operation.
//! Tokens are stateless, there is no revocation list; the short access
//! lifetime bounds the damage window.

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use crate::auth::config::AuthConfig;
use crate::auth::error::AuthError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id, stringified.
    pub sub: String,
    /// Present only when true; absent means a regular user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_admin: Option<bool>,
    pub exp: i64,
    pub iss: String,
    #[serde(rename = "type")]
    pub token_type: TokenType,
}

impl Claims {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.is_admin.unwrap_or(false)
    }

    /// Parse `sub` back into a user id.
    pub fn user_id(&self) -> Result<i64, AuthError> {
        self.sub.parse().map_err(|_| AuthError::TokenInvalid)
    }
}

#[derive(Clone, Debug)]
pub struct TokenPair {
    pub access: String,
    pub access_expires: i64,
    pub refresh: Option<String>,
    pub refresh_expires: Option<i64>,
}

#[derive(Clone)]
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl JwtCodec {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.secret_key().expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.issuer().to_string(),
            access_ttl_seconds: config.access_ttl_seconds(),
            refresh_ttl_seconds: config.refresh_ttl_seconds(),
        }
    }

    /// Mint an access token and, unless `only_access`, a refresh token.
    pub fn generate_pair(
        &self,
        user_id: i64,
        is_admin: bool,
        only_access: bool,
    ) -> Result<TokenPair, AuthError> {
        let now = Utc::now().timestamp();
        let access_expires = now + self.access_ttl_seconds;
        let access = self.encode(user_id, is_admin, access_expires, TokenType::Access)?;

        if only_access {
            return Ok(TokenPair {
                access,
                access_expires,
                refresh: None,
                refresh_expires: None,
            });
        }

        let refresh_expires = now + self.refresh_ttl_seconds;
        let refresh = self.encode(user_id, is_admin, refresh_expires, TokenType::Refresh)?;
        Ok(TokenPair {
            access,
            access_expires,
            refresh: Some(refresh),
            refresh_expires: Some(refresh_expires),
        })
    }

    /// Verify signature and expiry. Malformed, forged, and expired tokens
    /// are indistinguishable to the caller.
    pub fn decode(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AuthError::TokenInvalid)
    }

    fn encode(
        &self,
        user_id: i64,
        is_admin: bool,
        exp: i64,
        token_type: TokenType,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id.to_string(),
            is_admin: if is_admin { Some(true) } else { None },
            exp,
            iss: self.issuer.clone(),
            token_type,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|err| AuthError::Internal(err.into()))
    }
}
