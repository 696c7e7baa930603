//! PBKDF2 password hashing.
//!
//! Hashes are deterministic: a configured digest, a fixed iteration count and
//! a single deployment-wide salt, hex-encoded. The shared salt means equal
//! passwords produce equal hashes across accounts, which leaks equality and
//! weakens rainbow-table resistance; it is kept for compatibility with the
//! stored credential format. Changing the salt, digest, or iteration count
//! invalidates every stored hash at once.

use crate::auth::config::{AuthConfig, HashAlgorithm};
use pbkdf2::pbkdf2_hmac_array;
use sha2::{Sha256, Sha512};

#[derive(Clone, Debug)]
pub struct PasswordHasher {
    algorithm: HashAlgorithm,
    iterations: u32,
    salt: String,
}

impl PasswordHasher {
    #[must_use]
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            algorithm: config.hash_algorithm(),
            iterations: config.hash_iterations(),
            salt: config.hash_salt().to_string(),
        }
    }

    /// Hash a raw password into its stored hex form.
    #[must_use]
    pub fn hash(&self, raw: &str) -> String {
        let password = raw.as_bytes();
        let salt = self.salt.as_bytes();
        match self.algorithm {
            HashAlgorithm::Sha256 => {
                let digest = pbkdf2_hmac_array::<Sha256, 32>(password, salt, self.iterations);
                hex::encode(digest)
            }
            HashAlgorithm::Sha512 => {
                let digest = pbkdf2_hmac_array::<Sha512, 64>(password, salt, self.iterations);
                hex::encode(digest)
            }
        }
    }

    /// Check a raw password against a stored hash by re-hashing.
    #[must_use]
    pub fn verify(&self, raw: &str, stored: &str) -> bool {
        self.hash(raw) == stored
    }
}
