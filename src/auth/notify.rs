//! Fire-and-forget email notification.
//!
//! Auth flows hand an [`EmailTask`] to a [`Notifier`] and move on; delivery
//! never blocks or fails a request. [`SpawnNotifier`] runs each task on a
//! background tokio task with retry, exponential backoff and jitter, logging
//! and swallowing terminal failures. The [`EmailSender`] trait is the
//! delivery seam (SMTP, API, broker); `LogEmailSender` is the local-dev
//! sender that just logs.

use anyhow::Result;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

#[derive(Clone, Debug)]
pub struct EmailTask {
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

/// Email delivery abstraction.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error to trigger a retry.
    fn send(&self, task: &EmailTask) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, task: &EmailTask) -> Result<()> {
        info!(
            to_email = %task.to_email,
            template = %task.template,
            payload = %task.payload_json,
            "email send stub"
        );
        Ok(())
    }
}

pub trait Notifier: Send + Sync {
    /// Submit a task for background delivery. Returns as soon as the task
    /// is accepted; delivery happens later or not at all.
    fn enqueue(&self, task: EmailTask);
}

#[derive(Clone, Copy, Debug)]
pub struct RetryConfig {
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl RetryConfig {
    /// Defaults: 5 attempts, 5s->5m exponential backoff with jitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_attempts: 5,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(300),
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_backoff_base_seconds(mut self, seconds: u64) -> Self {
        self.backoff_base = Duration::from_secs(seconds.max(1));
        self
    }

    #[must_use]
    pub fn with_backoff_max_seconds(mut self, seconds: u64) -> Self {
        self.backoff_max = Duration::from_secs(seconds.max(1));
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// [`Notifier`] that delivers each task on its own tokio task.
#[derive(Clone)]
pub struct SpawnNotifier {
    sender: Arc<dyn EmailSender>,
    retry: RetryConfig,
}

impl SpawnNotifier {
    #[must_use]
    pub fn new(sender: Arc<dyn EmailSender>, retry: RetryConfig) -> Self {
        Self { sender, retry }
    }
}

impl Notifier for SpawnNotifier {
    fn enqueue(&self, task: EmailTask) {
        let sender = Arc::clone(&self.sender);
        let retry = self.retry;
        tokio::spawn(async move {
            deliver_with_retry(sender.as_ref(), &task, retry).await;
        });
    }
}

async fn deliver_with_retry(sender: &dyn EmailSender, task: &EmailTask, retry: RetryConfig) {
    for attempt in 1..=retry.max_attempts {
        match sender.send(task) {
            Ok(()) => return,
            Err(err) => {
                if attempt == retry.max_attempts {
                    error!(
                        to_email = %task.to_email,
                        template = %task.template,
                        "email delivery failed after {attempt} attempts: {err}"
                    );
                    return;
                }
                sleep(backoff_delay(attempt, retry.backoff_base, retry.backoff_max)).await;
            }
        }
    }
}

fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let shift = attempt.saturating_sub(1).min(31);
    let factor = 1u32 << shift;
    let delay = base.checked_mul(factor).unwrap_or(max);
    let capped = if delay > max { max } else { delay };
    jitter_delay(capped)
}

fn jitter_delay(delay: Duration) -> Duration {
    let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
    if delay_ms < 2 {
        return delay;
    }
    let half = delay_ms / 2;
    let jitter = rand::thread_rng().gen_range(0..=half);
    Duration::from_millis(half + jitter)
}
