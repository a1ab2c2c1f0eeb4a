use std::{future::Future, time::Duration};

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    serde::Serialize,
    sqlx::SqlitePool,
};

use crate::{
    clock::{from_millis, to_millis},
    error::{AuthError, Result},
};

/// A persisted credential as seen by callers. Never carries the digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: String,
    pub owner_id: String,
    pub display_prefix: String,
    pub label: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Usable iff active and not expired. A credential expiring exactly at
    /// `now` is already expired.
    #[must_use]
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired_at(now)
    }

    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

/// Everything needed to insert a new credential.
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub id: String,
    pub owner_id: String,
    pub digest: String,
    pub display_prefix: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Persistent credential records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fails with [`AuthError::Conflict`] if the digest already exists.
    async fn insert(&self, record: NewCredential) -> Result<Credential>;
    async fn find_by_digest(&self, digest: &str) -> Result<Option<Credential>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Credential>>;
    /// Newest first.
    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<Credential>>;
    async fn mark_used(&self, id: &str, at: DateTime<Utc>) -> Result<()>;
    /// Conditional on `owner_id` in the same statement. A record that does not
    /// exist or belongs to someone else yields [`AuthError::NotFound`].
    async fn set_active(
        &self,
        id: &str,
        owner_id: &str,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<Credential>;
}

/// Run a store call under `deadline`; an elapsed deadline fails closed.
pub(crate) async fn within<T>(
    deadline: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| AuthError::Unavailable(format!("backend call exceeded {deadline:?}")))?
}

// ── SQLite-backed implementation ────────────────────────────────────

const CREDENTIAL_COLUMNS: &str = "id, owner_id, key_prefix, label, active, created_at, updated_at, last_used_at, expires_at";

pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    /// Wrap `pool` and make sure the schema is current.
    pub async fn new(pool: SqlitePool) -> anyhow::Result<Self> {
        crate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Hard-delete every credential of `owner_id`. Administrative only.
    pub async fn purge_owner(&self, owner_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM api_keys WHERE owner_id = ?")
            .bind(owner_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Internal row type for sqlx mapping.
#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: String,
    owner_id: String,
    key_prefix: String,
    label: String,
    active: i64,
    created_at: i64,
    updated_at: i64,
    last_used_at: Option<i64>,
    expires_at: Option<i64>,
}

impl From<CredentialRow> for Credential {
    fn from(r: CredentialRow) -> Self {
        Self {
            id: r.id,
            owner_id: r.owner_id,
            display_prefix: r.key_prefix,
            label: r.label,
            active: r.active != 0,
            created_at: from_millis(r.created_at),
            updated_at: from_millis(r.updated_at),
            last_used_at: r.last_used_at.map(from_millis),
            expires_at: r.expires_at.map(from_millis),
        }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn insert(&self, record: NewCredential) -> Result<Credential> {
        let created = to_millis(record.created_at);
        let row: CredentialRow = sqlx::query_as(&format!(
            "INSERT INTO api_keys (id, owner_id, key_hash, key_prefix, label, active, created_at, updated_at, expires_at)
             VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)
             RETURNING {CREDENTIAL_COLUMNS}"
        ))
        .bind(&record.id)
        .bind(&record.owner_id)
        .bind(&record.digest)
        .bind(&record.display_prefix)
        .bind(&record.label)
        .bind(created)
        .bind(created)
        .bind(record.expires_at.map(to_millis))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_by_digest(&self, digest: &str) -> Result<Option<Credential>> {
        let row: Option<CredentialRow> = sqlx::query_as(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM api_keys WHERE key_hash = ?"
        ))
        .bind(digest)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Credential>> {
        let row: Option<CredentialRow> = sqlx::query_as(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM api_keys WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_owner(&self, owner_id: &str) -> Result<Vec<Credential>> {
        let rows: Vec<CredentialRow> = sqlx::query_as(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM api_keys WHERE owner_id = ?
             ORDER BY created_at DESC, rowid DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_used(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = ? WHERE id = ?")
            .bind(to_millis(at))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_active(
        &self,
        id: &str,
        owner_id: &str,
        active: bool,
        at: DateTime<Utc>,
    ) -> Result<Credential> {
        let row: Option<CredentialRow> = sqlx::query_as(&format!(
            "UPDATE api_keys SET active = ?, updated_at = ?
             WHERE id = ? AND owner_id = ?
             RETURNING {CREDENTIAL_COLUMNS}"
        ))
        .bind(i64::from(active))
        .bind(to_millis(at))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Into::into).ok_or(AuthError::NotFound)
    }
}
