//! Postgres-backed record store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use encore_core::{AuthRecordId, UserId};
use encore_identity::{AuthRecord, AuthStore, StoreError, User};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for auth record queries.
#[derive(FromRow)]
struct AuthRecordRow {
    id: String,
    provider: String,
    provider_identity_id: String,
    access_token: String,
    refresh_token: Option<String>,
    token_expiry: Option<DateTime<Utc>>,
    is_valid: bool,
    last_authenticated_at: DateTime<Utc>,
    display_name: String,
    avatar_url: Option<String>,
    username: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AuthRecordRow {
    fn try_into_record(self) -> Result<AuthRecord, StoreError> {
        let id = AuthRecordId::from_str(&self.id).map_err(|e| StoreError::StorageFailed {
            reason: format!("invalid auth record id '{}': {}", self.id, e),
        })?;
        Ok(AuthRecord::with_all_fields(
            id,
            self.provider,
            self.provider_identity_id,
            self.access_token,
            self.refresh_token,
            self.token_expiry,
            self.is_valid,
            self.last_authenticated_at,
            self.display_name,
            self.avatar_url,
            self.username,
            self.created_at,
            self.updated_at,
        ))
    }
}

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: String,
    active_auth_record_id: String,
    linked_auth_record_id: Option<String>,
    display_name: String,
    avatar_url: Option<String>,
    username: Option<String>,
    is_admin: bool,
    last_seen_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User, StoreError> {
        let id = UserId::from_str(&self.id).map_err(|e| StoreError::StorageFailed {
            reason: format!("invalid user id '{}': {}", self.id, e),
        })?;
        let active = AuthRecordId::from_str(&self.active_auth_record_id).map_err(|e| {
            StoreError::StorageFailed {
                reason: format!(
                    "invalid auth record id '{}': {}",
                    self.active_auth_record_id, e
                ),
            }
        })?;
        let linked = self
            .linked_auth_record_id
            .as_deref()
            .map(AuthRecordId::from_str)
            .transpose()
            .map_err(|e| StoreError::StorageFailed {
                reason: format!("invalid linked auth record id: {e}"),
            })?;
        Ok(User::with_all_fields(
            id,
            active,
            linked,
            self.display_name,
            self.avatar_url,
            self.username,
            self.is_admin,
            self.last_seen_at,
            self.created_at,
            self.updated_at,
        ))
    }
}

fn storage_failed(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if matches!(db_err.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return StoreError::Conflict {
                reason: db_err.message().to_string(),
            };
        }
    }
    StoreError::StorageFailed {
        reason: e.to_string(),
    }
}

const RECORD_COLUMNS: &str = "id, provider, provider_identity_id, access_token, refresh_token, \
     token_expiry, is_valid, last_authenticated_at, display_name, avatar_url, username, \
     created_at, updated_at";

const USER_COLUMNS: &str = "id, active_auth_record_id, linked_auth_record_id, display_name, \
     avatar_url, username, is_admin, last_seen_at, created_at, updated_at";

/// Postgres implementation of the record store.
#[derive(Clone)]
pub struct PgAuthStore {
    pool: PgPool,
}

impl PgAuthStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuthStore for PgAuthStore {
    async fn find_record(&self, id: AuthRecordId) -> Result<Option<AuthRecord>, StoreError> {
        let row: Option<AuthRecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM auth_records WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_failed)?;

        row.map(AuthRecordRow::try_into_record).transpose()
    }

    async fn find_record_by_identity(
        &self,
        provider: &str,
        provider_identity_id: &str,
    ) -> Result<Option<AuthRecord>, StoreError> {
        let row: Option<AuthRecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM auth_records \
             WHERE provider = $1 AND provider_identity_id = $2"
        ))
        .bind(provider)
        .bind(provider_identity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_failed)?;

        row.map(AuthRecordRow::try_into_record).transpose()
    }

    async fn upsert_record(&self, record: &AuthRecord) -> Result<AuthRecord, StoreError> {
        // The conflict target is the unique provider identity; a
        // concurrent insert for the same identity converges on the
        // stored row's id.
        let row: AuthRecordRow = sqlx::query_as(&format!(
            "INSERT INTO auth_records ({RECORD_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             ON CONFLICT (provider, provider_identity_id) DO UPDATE SET \
                 access_token = EXCLUDED.access_token, \
                 refresh_token = EXCLUDED.refresh_token, \
                 token_expiry = EXCLUDED.token_expiry, \
                 is_valid = EXCLUDED.is_valid, \
                 last_authenticated_at = EXCLUDED.last_authenticated_at, \
                 display_name = EXCLUDED.display_name, \
                 avatar_url = EXCLUDED.avatar_url, \
                 username = EXCLUDED.username, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(record.id().to_string())
        .bind(record.provider())
        .bind(record.provider_identity_id())
        .bind(record.access_token())
        .bind(record.refresh_token())
        .bind(record.token_expiry())
        .bind(record.is_valid())
        .bind(record.last_authenticated_at())
        .bind(record.display_name())
        .bind(record.avatar_url())
        .bind(record.username())
        .bind(record.created_at())
        .bind(record.updated_at())
        .fetch_one(&self.pool)
        .await
        .map_err(storage_failed)?;

        row.try_into_record()
    }

    async fn find_overdue_records(
        &self,
        provider: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<AuthRecord>, StoreError> {
        let rows: Vec<AuthRecordRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM auth_records \
             WHERE provider = $1 AND is_valid AND last_authenticated_at < $2"
        ))
        .bind(provider)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_failed)?;

        rows.into_iter()
            .map(AuthRecordRow::try_into_record)
            .collect()
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_failed)?;

        row.map(UserRow::try_into_user).transpose()
    }

    async fn find_user_by_record(
        &self,
        record_id: AuthRecordId,
    ) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE active_auth_record_id = $1 OR linked_auth_record_id = $1"
        ))
        .bind(record_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_failed)?;

        row.map(UserRow::try_into_user).transpose()
    }

    async fn create_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(user.id().to_string())
        .bind(user.active_auth_record_id().to_string())
        .bind(user.linked_auth_record_id().map(|id| id.to_string()))
        .bind(user.display_name())
        .bind(user.avatar_url())
        .bind(user.username())
        .bind(user.is_admin())
        .bind(user.last_seen_at())
        .bind(user.created_at())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map_err(storage_failed)?;

        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE users SET \
                 active_auth_record_id = $2, \
                 linked_auth_record_id = $3, \
                 display_name = $4, \
                 avatar_url = $5, \
                 username = $6, \
                 is_admin = $7, \
                 last_seen_at = $8, \
                 updated_at = $9 \
             WHERE id = $1",
        )
        .bind(user.id().to_string())
        .bind(user.active_auth_record_id().to_string())
        .bind(user.linked_auth_record_id().map(|id| id.to_string()))
        .bind(user.display_name())
        .bind(user.avatar_url())
        .bind(user.username())
        .bind(user.is_admin())
        .bind(user.last_seen_at())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await
        .map_err(storage_failed)?;

        Ok(())
    }

    async fn count_users(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(storage_failed)?;

        Ok(count.max(0) as u64)
    }
}
