//! User persistence behind the [`UserStore`] trait.
//!
//! `PgUserStore` is the production implementation over sqlx/Postgres;
//! `MemoryUserStore` backs local dev and tests. Emails are stored exactly as
//! the caller passes them, so callers normalize before touching the store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::Mutex;
use tracing::{info_span, Instrument};

#[derive(Clone, Debug, PartialEq, Eq, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub is_active: bool,
    pub email_confirmed: bool,
}

#[derive(Clone, Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
}

/// Outcome of an insert attempt; duplicate email is a normal answer,
/// not an error.
#[derive(Debug)]
pub enum InsertOutcome {
    Created(UserRecord),
    DuplicateEmail,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    async fn insert(&self, user: NewUser) -> Result<InsertOutcome>;

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()>;

    /// Mark the user's email confirmed. Confirming twice is a no-op.
    async fn confirm_email(&self, id: i64) -> Result<()>;
}

#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>> {
        let query = r"
            SELECT id, email, password_hash, is_admin, is_active, email_confirmed
            FROM users
            WHERE id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query_as::<_, UserRecord>(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load user by id")
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let query = r"
            SELECT id, email, password_hash, is_admin, is_active, email_confirmed
            FROM users
            WHERE email = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        sqlx::query_as::<_, UserRecord>(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to load user by email")
    }

    async fn insert(&self, user: NewUser) -> Result<InsertOutcome> {
        let query = r"
            INSERT INTO users (email, password_hash, is_admin, is_active, email_confirmed)
            VALUES ($1, $2, FALSE, TRUE, FALSE)
            RETURNING id, email, password_hash, is_admin, is_active, email_confirmed
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let result = sqlx::query_as::<_, UserRecord>(query)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .instrument(span)
            .await;

        match result {
            Ok(record) => Ok(InsertOutcome::Created(record)),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::DuplicateEmail),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let query = r"
            UPDATE users
            SET password_hash = $2
            WHERE id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update password hash")?;
        Ok(())
    }

    async fn confirm_email(&self, id: i64) -> Result<()> {
        let query = r"
            UPDATE users
            SET email_confirmed = TRUE
            WHERE id = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to confirm email")?;
        Ok(())
    }
}

/// In-process [`UserStore`] for local dev and tests.
#[derive(Debug)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<i64, UserRecord>>,
    next_id: AtomicI64,
}

impl MemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Insert a fully formed record, bypassing the duplicate check.
    pub async fn seed(&self, record: UserRecord) {
        self.next_id.fetch_max(record.id + 1, Ordering::SeqCst);
        let mut users = self.users.lock().await;
        users.insert(record.id, record);
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>> {
        let users = self.users.lock().await;
        Ok(users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let users = self.users.lock().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<InsertOutcome> {
        let mut users = self.users.lock().await;
        if users.values().any(|existing| existing.email == user.email) {
            return Ok(InsertOutcome::DuplicateEmail);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let record = UserRecord {
            id,
            email: user.email,
            password_hash: user.password_hash,
            is_admin: false,
            is_active: true,
            email_confirmed: false,
        };
        users.insert(id, record.clone());
        Ok(InsertOutcome::Created(record))
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<()> {
        let mut users = self.users.lock().await;
        if let Some(user) = users.get_mut(&id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn confirm_email(&self, id: i64) -> Result<()> {
        let mut users = self.users.lock().await;
        if let Some(user) = users.get_mut(&id) {
            user.email_confirmed = true;
        }
        Ok(())
    }
}
