//! Key/value store abstraction with TTL semantics.
//!
//! The throttle and the used-reset-token markers need a Redis-shaped store:
//! string keys, string values, per-key expiry. Production deployments plug a
//! real Redis client in behind [`KvStore`]; [`MemoryKv`] covers local dev and
//! tests with the same observable behavior.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Fetch a live value, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store a value with a fresh TTL, replacing any previous entry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Remaining lifetime of a key, `None` when absent or expired.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;
}

/// In-process [`KvStore`] with lazy expiry.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, (String, Instant)>>,
}

impl MemoryKv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (_, deadline)| *deadline > now);
        Ok(entries.get(key).map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let deadline = Instant::now() + ttl;
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (_, deadline)| *deadline > now);
        Ok(entries
            .get(key)
            .map(|(_, deadline)| deadline.saturating_duration_since(now)))
    }
}
