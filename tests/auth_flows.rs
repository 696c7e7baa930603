//! End-to-end account flows over in-memory stores.

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::{Arc, Mutex};
use torgi::auth::{
    AuthConfig, AuthError, AuthService, EmailTask, KvStore, MemoryKv, MemoryUserStore, Notifier,
    ResendOutcome, TokenType, UserRecord, UserStore,
};

/// Captures enqueued email tasks instead of delivering them.
#[derive(Default)]
struct RecordingNotifier {
    tasks: Mutex<Vec<EmailTask>>,
}

impl RecordingNotifier {
    fn tasks(&self) -> Vec<EmailTask> {
        self.tasks.lock().unwrap().clone()
    }

    fn last_task(&self) -> Option<EmailTask> {
        self.tasks.lock().unwrap().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn enqueue(&self, task: EmailTask) {
        self.tasks.lock().unwrap().push(task);
    }
}

struct Harness {
    auth: AuthService,
    users: Arc<MemoryUserStore>,
    kv: Arc<MemoryKv>,
    notifier: Arc<RecordingNotifier>,
}

fn harness() -> Harness {
    let config = AuthConfig::new(
        SecretString::from("integration-secret".to_string()),
        "torgi.dev".to_string(),
    )
    .with_hash_iterations(1000)
    .with_bad_login_max_attempts(2);

    let users = Arc::new(MemoryUserStore::new());
    let kv = Arc::new(MemoryKv::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let auth = AuthService::new(
        config,
        Arc::clone(&users) as Arc<dyn UserStore>,
        Arc::clone(&kv) as Arc<dyn KvStore>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
    );
    Harness {
        auth,
        users,
        kv,
        notifier,
    }
}

/// Pull the signed token out of the link in the last captured email.
fn token_from_last_email(notifier: &RecordingNotifier) -> Result<String> {
    let task = notifier.last_task().context("no email task captured")?;
    let payload: serde_json::Value = serde_json::from_str(&task.payload_json)?;
    let link = payload
        .get("link")
        .and_then(serde_json::Value::as_str)
        .context("email payload has no link")?;
    let token = link.rsplit('/').next().context("link has no token")?;
    Ok(token.to_string())
}

#[tokio::test]
async fn register_and_login_is_email_case_insensitive() -> Result<()> {
    let h = harness();
    let record = h.auth.register("  User@Example.COM ", "hunter2").await?;
    assert_eq!(record.email, "user@example.com");

    let pair = h.auth.login("USER@example.com", "hunter2").await?;
    assert!(pair.refresh.is_some());

    let identity = h.auth.authenticate_access(&pair.access)?;
    assert_eq!(identity.user_id, record.id);
    assert!(!identity.is_admin);
    Ok(())
}

#[tokio::test]
async fn duplicate_registration_rejected() -> Result<()> {
    let h = harness();
    h.auth.register("user@example.com", "hunter2").await?;
    let err = h
        .auth
        .register("USER@example.com", "other")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::DuplicateEmail));
    Ok(())
}

#[tokio::test]
async fn login_with_unknown_email_rejected() -> Result<()> {
    let h = harness();
    let err = h.auth.login("ghost@example.com", "hunter2").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    Ok(())
}

#[tokio::test]
async fn blocked_account_cannot_login() -> Result<()> {
    let h = harness();
    h.users
        .seed(UserRecord {
            id: 1,
            email: "blocked@example.com".to_string(),
            password_hash: "irrelevant".to_string(),
            is_admin: false,
            is_active: false,
            email_confirmed: true,
        })
        .await;

    let err = h
        .auth
        .login("blocked@example.com", "hunter2")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AccountBlocked));
    Ok(())
}

#[tokio::test]
async fn lockout_rejects_even_the_correct_password() -> Result<()> {
    let h = harness();
    h.auth.register("user@example.com", "hunter2").await?;

    // Limit is 2; the third failure escalates to a lock.
    for _ in 0..3 {
        let err = h.auth.login("user@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    // Correct password, still locked: the hasher never runs.
    let err = h
        .auth
        .login("user@example.com", "hunter2")
        .await
        .unwrap_err();
    match err {
        AuthError::TooManyAttempts {
            retry_after_seconds,
        } => assert!(retry_after_seconds > 0),
        other => panic!("expected TooManyAttempts, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn successful_login_resets_the_counter() -> Result<()> {
    let h = harness();
    h.auth.register("user@example.com", "hunter2").await?;

    for _ in 0..2 {
        let _ = h.auth.login("user@example.com", "wrong").await;
    }
    h.auth.login("user@example.com", "hunter2").await?;

    // The slate is clean: two more failures stay under the limit.
    for _ in 0..2 {
        let err = h.auth.login("user@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }
    h.auth.login("user@example.com", "hunter2").await?;
    Ok(())
}

#[tokio::test]
async fn refresh_mints_access_only() -> Result<()> {
    let h = harness();
    h.auth.register("user@example.com", "hunter2").await?;
    let pair = h.auth.login("user@example.com", "hunter2").await?;
    let refresh_token = pair.refresh.context("refresh token expected")?;

    let refreshed = h.auth.refresh(&refresh_token).await?;
    assert!(refreshed.refresh.is_none());

    let identity = h.auth.authenticate_access(&refreshed.access)?;
    assert!(!identity.is_admin);
    Ok(())
}

#[tokio::test]
async fn access_token_is_not_a_refresh_token() -> Result<()> {
    let h = harness();
    h.auth.register("user@example.com", "hunter2").await?;
    let pair = h.auth.login("user@example.com", "hunter2").await?;

    let err = h.auth.refresh(&pair.access).await.unwrap_err();
    assert!(matches!(err, AuthError::WrongTokenType));

    let refresh_token = pair.refresh.context("refresh token expected")?;
    let err = h.auth.authenticate_access(&refresh_token).unwrap_err();
    assert!(matches!(err, AuthError::WrongTokenType));
    Ok(())
}

#[tokio::test]
async fn refresh_carries_the_admin_flag_from_claims() -> Result<()> {
    let h = harness();
    let hasher = torgi::auth::PasswordHasher::new(h.auth.config());
    h.users
        .seed(UserRecord {
            id: 1,
            email: "admin@example.com".to_string(),
            password_hash: hasher.hash("hunter2"),
            is_admin: true,
            is_active: true,
            email_confirmed: true,
        })
        .await;

    let pair = h.auth.login("admin@example.com", "hunter2").await?;
    let refresh_token = pair.refresh.context("refresh token expected")?;
    let refreshed = h.auth.refresh(&refresh_token).await?;

    let identity = h.auth.authenticate_admin(&refreshed.access)?;
    assert!(identity.is_admin);
    Ok(())
}

#[tokio::test]
async fn admin_gate_fails_closed_for_regular_users() -> Result<()> {
    let h = harness();
    h.auth.register("user@example.com", "hunter2").await?;
    let pair = h.auth.login("user@example.com", "hunter2").await?;

    let err = h.auth.authenticate_admin(&pair.access).unwrap_err();
    assert!(matches!(err, AuthError::AdminRequired));
    Ok(())
}

#[tokio::test]
async fn email_confirmation_round_trip() -> Result<()> {
    let h = harness();
    let record = h.auth.register("user@example.com", "hunter2").await?;
    assert!(!record.email_confirmed);

    let tasks = h.notifier.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].template, "email_confirm");
    assert_eq!(tasks[0].to_email, "user@example.com");

    let token = token_from_last_email(&h.notifier)?;
    h.auth.confirm_email(&token).await?;
    let user = h
        .users
        .find_by_email("user@example.com")
        .await?
        .context("user should exist")?;
    assert!(user.email_confirmed);

    // Redeeming the same link again still succeeds.
    h.auth.confirm_email(&token).await?;
    Ok(())
}

#[tokio::test]
async fn garbage_confirmation_link_rejected() -> Result<()> {
    let h = harness();
    let err = h.auth.confirm_email("not-a-token").await.unwrap_err();
    assert!(matches!(err, AuthError::LinkInvalid));
    Ok(())
}

#[tokio::test]
async fn resend_confirmation_until_confirmed() -> Result<()> {
    let h = harness();
    let record = h.auth.register("user@example.com", "hunter2").await?;

    assert_eq!(
        h.auth.resend_confirmation(record.id).await?,
        ResendOutcome::Sent
    );
    assert_eq!(h.notifier.tasks().len(), 2);

    let token = token_from_last_email(&h.notifier)?;
    h.auth.confirm_email(&token).await?;

    assert_eq!(
        h.auth.resend_confirmation(record.id).await?,
        ResendOutcome::AlreadyConfirmed
    );
    assert_eq!(h.notifier.tasks().len(), 2);
    Ok(())
}

#[tokio::test]
async fn password_change_requires_the_current_password() -> Result<()> {
    let h = harness();
    let record = h.auth.register("user@example.com", "hunter2").await?;

    let err = h
        .auth
        .change_password(record.id, "wrong", "new-password")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::WrongPassword));

    h.auth
        .change_password(record.id, "hunter2", "new-password")
        .await?;
    h.auth.login("user@example.com", "new-password").await?;
    let err = h.auth.login("user@example.com", "hunter2").await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    Ok(())
}

#[tokio::test]
async fn password_reset_token_is_single_use() -> Result<()> {
    let h = harness();
    h.auth.register("user@example.com", "hunter2").await?;

    h.auth.request_password_reset("user@example.com").await?;
    let tasks = h.notifier.tasks();
    assert_eq!(tasks.last().map(|t| t.template.as_str()), Some("password_reset"));

    let token = token_from_last_email(&h.notifier)?;
    h.auth.confirm_password_reset(&token, "new-password").await?;
    h.auth.login("user@example.com", "new-password").await?;

    // Replay is rejected even though the signature is still valid.
    let err = h
        .auth
        .confirm_password_reset(&token, "sneaky-password")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::LinkInvalid));
    h.auth.login("user@example.com", "new-password").await?;
    Ok(())
}

#[tokio::test]
async fn reset_request_is_enumeration_safe() -> Result<()> {
    let h = harness();
    h.auth.register("user@example.com", "hunter2").await?;
    let before = h.notifier.tasks().len();

    // Unknown email: same success, no email queued.
    h.auth.request_password_reset("ghost@example.com").await?;
    assert_eq!(h.notifier.tasks().len(), before);

    h.auth.request_password_reset("user@example.com").await?;
    assert_eq!(h.notifier.tasks().len(), before + 1);
    Ok(())
}

#[tokio::test]
async fn multiple_reset_tokens_coexist() -> Result<()> {
    let h = harness();
    h.auth.register("user@example.com", "hunter2").await?;

    h.auth.request_password_reset("user@example.com").await?;
    let first = token_from_last_email(&h.notifier)?;
    h.auth.request_password_reset("user@example.com").await?;
    let second = token_from_last_email(&h.notifier)?;

    // Redeeming the second does not invalidate the first.
    h.auth.confirm_password_reset(&second, "pass-two").await?;
    h.auth.confirm_password_reset(&first, "pass-one").await?;
    h.auth.login("user@example.com", "pass-one").await?;
    Ok(())
}

#[tokio::test]
async fn tampered_reset_token_rejected() -> Result<()> {
    let h = harness();
    h.auth.register("user@example.com", "hunter2").await?;
    h.auth.request_password_reset("user@example.com").await?;

    let mut token = token_from_last_email(&h.notifier)?;
    token.insert(0, 'x');
    let err = h
        .auth
        .confirm_password_reset(&token, "new-password")
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::LinkInvalid));
    Ok(())
}

#[tokio::test]
async fn session_tokens_have_the_expected_types() -> Result<()> {
    let h = harness();
    h.auth.register("user@example.com", "hunter2").await?;
    let pair = h.auth.login("user@example.com", "hunter2").await?;

    // Peek at the claims through the public decode path.
    let codec = torgi::auth::JwtCodec::new(h.auth.config());
    let access = codec.decode(&pair.access)?;
    assert_eq!(access.token_type, TokenType::Access);
    assert_eq!(access.iss, "torgi.dev");

    let refresh = codec.decode(&pair.refresh.context("refresh token expected")?)?;
    assert_eq!(refresh.token_type, TokenType::Refresh);
    assert!(refresh.exp > access.exp);

    // The kv store only holds throttle and reset markers; a clean login
    // leaves nothing behind.
    assert_eq!(
        h.kv.get("auth_user_bad_login_count_user@example.com").await?,
        None
    );
    Ok(())
}
