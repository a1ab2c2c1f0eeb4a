//! Browser sessions and the user directory behind them.
//!
//! The unified authenticator only depends on [`SessionVerifier`]; the SQLite
//! store here is a minimal stand-in for a full session framework.

use std::sync::Arc;

use {
    async_trait::async_trait,
    chrono::Duration,
    tracing::debug,
};

use crate::{
    clock::{Clock, to_millis},
    error::{AuthError, Result},
    principal::{Principal, PrincipalDirectory},
    request::RequestContext,
    secret,
};

/// Session cookie name used when none is configured.
pub const DEFAULT_SESSION_COOKIE: &str = "warden_session";

/// Framework-managed session check: a principal, or a typed failure.
#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, ctx: &RequestContext<'_>) -> Result<Principal>;
}

pub struct SqliteSessionStore {
    pool: sqlx::SqlitePool,
    clock: Arc<dyn Clock>,
    cookie_name: String,
    ttl: Duration,
}

impl SqliteSessionStore {
    pub async fn new(pool: sqlx::SqlitePool, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        crate::run_migrations(&pool).await?;
        Ok(Self {
            pool,
            clock,
            cookie_name: DEFAULT_SESSION_COOKIE.to_string(),
            ttl: Duration::days(30),
        })
    }

    #[must_use]
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    // ── Users ────────────────────────────────────────────────────────────

    pub async fn create_user(&self, email: &str, name: Option<&str>) -> Result<Principal> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::InvalidRequest("email is required".into()));
        }
        let id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO users (id, email, name, created_at) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(email)
            .bind(name)
            .bind(to_millis(self.clock.now()))
            .execute(&self.pool)
            .await?;
        Ok(Principal {
            id,
            email: Some(email.to_string()),
            name: name.map(str::to_string),
        })
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<Principal>> {
        let row: Option<(String, Option<String>, Option<String>)> =
            sqlx::query_as("SELECT id, email, name FROM users WHERE email = ?")
                .bind(email.trim())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, email, name)| Principal { id, email, name }))
    }

    // ── Sessions ─────────────────────────────────────────────────────────

    /// Create a session for `user_id` and return the cookie value.
    /// Only its digest is stored.
    pub async fn create_session(&self, user_id: &str) -> Result<String> {
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(self.ttl)
            .ok_or_else(|| AuthError::InvalidRequest("session lifetime is out of range".into()))?;
        let token = secret::generate_token();
        sqlx::query(
            "INSERT INTO auth_sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(secret::digest(&token))
        .bind(user_id)
        .bind(to_millis(now))
        .bind(to_millis(expires_at))
        .execute(&self.pool)
        .await?;
        debug!(user_id, "session created");
        Ok(token)
    }

    /// Resolve a session token to its user.
    pub async fn resolve(&self, token: &str) -> Result<Principal> {
        let row: Option<(String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT u.id, u.email, u.name FROM auth_sessions s
             JOIN users u ON u.id = s.user_id
             WHERE s.token_hash = ? AND s.expires_at > ?",
        )
        .bind(secret::digest(token))
        .bind(to_millis(self.clock.now()))
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(id, email, name)| Principal { id, email, name })
            .ok_or(AuthError::InvalidCredential)
    }

    /// Delete a session (logout).
    pub async fn delete_session(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE token_hash = ?")
            .bind(secret::digest(token))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= ?")
            .bind(to_millis(self.clock.now()))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl SessionVerifier for SqliteSessionStore {
    async fn verify(&self, ctx: &RequestContext<'_>) -> Result<Principal> {
        let token = ctx
            .cookie(&self.cookie_name)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingCredential)?;
        self.resolve(token).await
    }
}

#[async_trait]
impl PrincipalDirectory for SqliteSessionStore {
    async fn lookup(&self, id: &str) -> Result<Option<Principal>> {
        let row: Option<(String, Option<String>, Option<String>)> =
            sqlx::query_as("SELECT id, email, name FROM users WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, email, name)| Principal { id, email, name }))
    }
}
