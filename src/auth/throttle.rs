//! Brute-force login throttle.
//!
//! A per-account failure counter lives in the key/value store under
//! `auth_user_bad_login_count_{email}`. While the count stays at or under the
//! limit the key carries a short "warm" TTL that slides on every failure;
//! once the count goes over the limit the TTL escalates to the ban window and
//! the account stays locked until the key expires or a successful login
//! clears it. Keys are account-scoped, not IP-scoped, so a distributed
//! attacker can lock a victim out; that trade-off is accepted.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::config::AuthConfig;
use crate::auth::kv::KvStore;

const KEY_PREFIX: &str = "auth_user_bad_login_count_";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleDecision {
    Clear,
    Locked { retry_after_seconds: u64 },
}

#[derive(Clone)]
pub struct LoginThrottle {
    kv: Arc<dyn KvStore>,
    max_attempts: u32,
    warm_ttl: Duration,
    ban_ttl: Duration,
}

impl LoginThrottle {
    #[must_use]
    pub fn new(config: &AuthConfig, kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            max_attempts: config.bad_login_max_attempts(),
            warm_ttl: Duration::from_secs(config.bad_login_warm_ttl_seconds()),
            ban_ttl: Duration::from_secs(config.bad_login_ban_ttl_seconds()),
        }
    }

    /// Decide whether login may proceed for this account. Never mutates
    /// the counter.
    pub async fn check(&self, email: &str) -> Result<ThrottleDecision> {
        let key = self.key(email);
        let count = self.count(&key).await?;
        if count <= u64::from(self.max_attempts) {
            return Ok(ThrottleDecision::Clear);
        }

        let retry_after = self
            .kv
            .ttl(&key)
            .await?
            .unwrap_or(self.ban_ttl)
            .as_secs()
            .max(1);
        Ok(ThrottleDecision::Locked {
            retry_after_seconds: retry_after,
        })
    }

    /// Record one failed attempt, sliding the warm TTL or escalating to
    /// the ban TTL once the count passes the limit.
    pub async fn record_failure(&self, email: &str) -> Result<()> {
        let key = self.key(email);
        let count = self.count(&key).await?.saturating_add(1);
        let ttl = if count > u64::from(self.max_attempts) {
            self.ban_ttl
        } else {
            self.warm_ttl
        };
        self.kv
            .set(&key, &count.to_string(), ttl)
            .await
            .context("failed to record bad login attempt")
    }

    /// Forget all recorded failures for this account.
    pub async fn clear(&self, email: &str) -> Result<()> {
        self.kv
            .delete(&self.key(email))
            .await
            .context("failed to clear bad login counter")
    }

    async fn count(&self, key: &str) -> Result<u64> {
        let value = self.kv.get(key).await?;
        // A value we cannot parse counts as zero rather than a permanent lock.
        Ok(value.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    fn key(&self, email: &str) -> String {
        format!("{KEY_PREFIX}{email}")
    }
}

#[cfg(test)]
mod tests {
    use super::{LoginThrottle, ThrottleDecision, KEY_PREFIX};
    use crate::auth::config::AuthConfig;
    use crate::auth::kv::{KvStore, MemoryKv};
    use anyhow::Result;
    use secrecy::SecretString;
    use std::sync::Arc;
    use std::time::Duration;

    fn throttle(kv: Arc<MemoryKv>) -> LoginThrottle {
        let config = AuthConfig::new(
            SecretString::from("test-secret".to_string()),
            "torgi.dev".to_string(),
        )
        .with_bad_login_max_attempts(3)
        .with_bad_login_warm_ttl_seconds(60)
        .with_bad_login_ban_ttl_seconds(3600);
        LoginThrottle::new(&config, kv)
    }

    #[tokio::test]
    async fn clear_until_limit_exceeded() -> Result<()> {
        let kv = Arc::new(MemoryKv::new());
        let throttle = throttle(Arc::clone(&kv));

        for _ in 0..3 {
            throttle.record_failure("user@example.com").await?;
            assert_eq!(
                throttle.check("user@example.com").await?,
                ThrottleDecision::Clear
            );
        }

        throttle.record_failure("user@example.com").await?;
        assert!(matches!(
            throttle.check("user@example.com").await?,
            ThrottleDecision::Locked { .. }
        ));
        Ok(())
    }

    #[tokio::test]
    async fn lockout_escalates_ttl() -> Result<()> {
        let kv = Arc::new(MemoryKv::new());
        let throttle = throttle(Arc::clone(&kv));

        for _ in 0..3 {
            throttle.record_failure("user@example.com").await?;
        }
        let key = format!("{KEY_PREFIX}user@example.com");
        let warm = kv.ttl(&key).await?.unwrap();
        assert!(warm <= Duration::from_secs(60));

        throttle.record_failure("user@example.com").await?;
        let banned = kv.ttl(&key).await?.unwrap();
        assert!(banned > Duration::from_secs(60));
        Ok(())
    }

    #[tokio::test]
    async fn locked_reports_remaining_ttl() -> Result<()> {
        let kv = Arc::new(MemoryKv::new());
        let throttle = throttle(Arc::clone(&kv));

        for _ in 0..4 {
            throttle.record_failure("user@example.com").await?;
        }
        match throttle.check("user@example.com").await? {
            ThrottleDecision::Locked {
                retry_after_seconds,
            } => {
                assert!(retry_after_seconds > 0);
                assert!(retry_after_seconds <= 3600);
            }
            ThrottleDecision::Clear => panic!("account should be locked"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn clear_removes_counter() -> Result<()> {
        let kv = Arc::new(MemoryKv::new());
        let throttle = throttle(Arc::clone(&kv));

        for _ in 0..4 {
            throttle.record_failure("user@example.com").await?;
        }
        throttle.clear("user@example.com").await?;
        assert_eq!(
            throttle.check("user@example.com").await?,
            ThrottleDecision::Clear
        );
        Ok(())
    }

    #[tokio::test]
    async fn counters_are_per_account() -> Result<()> {
        let kv = Arc::new(MemoryKv::new());
        let throttle = throttle(Arc::clone(&kv));

        for _ in 0..4 {
            throttle.record_failure("user@example.com").await?;
        }
        assert_eq!(
            throttle.check("other@example.com").await?,
            ThrottleDecision::Clear
        );
        Ok(())
    }

    #[tokio::test]
    async fn unparseable_counter_counts_as_zero() -> Result<()> {
        let kv = Arc::new(MemoryKv::new());
        kv.set(
            &format!("{KEY_PREFIX}user@example.com"),
            "garbage",
            Duration::from_secs(60),
        )
        .await?;
        let throttle = throttle(Arc::clone(&kv));
        assert_eq!(
            throttle.check("user@example.com").await?,
            ThrottleDecision::Clear
        );
        Ok(())
    }
}
