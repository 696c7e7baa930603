//! Auth configuration passed explicitly into each component.
//!
//! Nothing in the auth core reads ambient global state; every codec and
//! helper takes what it needs from an [`AuthConfig`] at construction time.

use secrecy::SecretString;

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 60 * 60 * 24;
const DEFAULT_HASH_ITERATIONS: u32 = 100_000;
const DEFAULT_HASH_SALT: &str = "torgi-password-salt";
const DEFAULT_SIGNED_TOKEN_SALT: &str = "torgi-signed-token";
const DEFAULT_SIGNED_TOKEN_MAX_AGE_SECONDS: i64 = 60 * 60 * 24;
const DEFAULT_BAD_LOGIN_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BAD_LOGIN_WARM_TTL_SECONDS: u64 = 10 * 60;
const DEFAULT_BAD_LOGIN_BAN_TTL_SECONDS: u64 = 60 * 60;
const DEFAULT_REFRESH_COOKIE_NAME: &str = "refresh";

/// Digest used by the password hasher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    secret_key: SecretString,
    issuer: String,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    hash_algorithm: HashAlgorithm,
    hash_iterations: u32,
    hash_salt: String,
    signed_token_salt: String,
    signed_token_max_age_seconds: i64,
    bad_login_max_attempts: u32,
    bad_login_warm_ttl_seconds: u64,
    bad_login_ban_ttl_seconds: u64,
    refresh_cookie_name: String,
}

impl AuthConfig {
    /// `issuer` is the domain name stamped into JWT claims and used for
    /// links and cookies.
    #[must_use]
    pub fn new(secret_key: SecretString, issuer: String) -> Self {
        Self {
            secret_key,
            issuer,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
            hash_algorithm: HashAlgorithm::Sha256,
            hash_iterations: DEFAULT_HASH_ITERATIONS,
            hash_salt: DEFAULT_HASH_SALT.to_string(),
            signed_token_salt: DEFAULT_SIGNED_TOKEN_SALT.to_string(),
            signed_token_max_age_seconds: DEFAULT_SIGNED_TOKEN_MAX_AGE_SECONDS,
            bad_login_max_attempts: DEFAULT_BAD_LOGIN_MAX_ATTEMPTS,
            bad_login_warm_ttl_seconds: DEFAULT_BAD_LOGIN_WARM_TTL_SECONDS,
            bad_login_ban_ttl_seconds: DEFAULT_BAD_LOGIN_BAN_TTL_SECONDS,
            refresh_cookie_name: DEFAULT_REFRESH_COOKIE_NAME.to_string(),
        }
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.hash_algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn with_hash_iterations(mut self, iterations: u32) -> Self {
        self.hash_iterations = iterations;
        self
    }

    #[must_use]
    pub fn with_hash_salt(mut self, salt: String) -> Self {
        self.hash_salt = salt;
        self
    }

    #[must_use]
    pub fn with_signed_token_salt(mut self, salt: String) -> Self {
        self.signed_token_salt = salt;
        self
    }

    #[must_use]
    pub fn with_signed_token_max_age_seconds(mut self, seconds: i64) -> Self {
        self.signed_token_max_age_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_bad_login_max_attempts(mut self, attempts: u32) -> Self {
        self.bad_login_max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn with_bad_login_warm_ttl_seconds(mut self, seconds: u64) -> Self {
        self.bad_login_warm_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_bad_login_ban_ttl_seconds(mut self, seconds: u64) -> Self {
        self.bad_login_ban_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_cookie_name(mut self, name: String) -> Self {
        self.refresh_cookie_name = name;
        self
    }

    #[must_use]
    pub fn secret_key(&self) -> &SecretString {
        &self.secret_key
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    #[must_use]
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    #[must_use]
    pub fn hash_iterations(&self) -> u32 {
        self.hash_iterations
    }

    #[must_use]
    pub fn hash_salt(&self) -> &str {
        &self.hash_salt
    }

    #[must_use]
    pub fn signed_token_salt(&self) -> &str {
        &self.signed_token_salt
    }

    #[must_use]
    pub fn signed_token_max_age_seconds(&self) -> i64 {
        self.signed_token_max_age_seconds
    }

    #[must_use]
    pub fn bad_login_max_attempts(&self) -> u32 {
        self.bad_login_max_attempts
    }

    #[must_use]
    pub fn bad_login_warm_ttl_seconds(&self) -> u64 {
        self.bad_login_warm_ttl_seconds
    }

    #[must_use]
    pub fn bad_login_ban_ttl_seconds(&self) -> u64 {
        self.bad_login_ban_ttl_seconds
    }

    #[must_use]
    pub fn refresh_cookie_name(&self) -> &str {
        &self.refresh_cookie_name
    }
}
