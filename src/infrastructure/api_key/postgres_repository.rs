//! PostgreSQL API key store implementation
//!
//! Conditional mutations are single `UPDATE ... WHERE` statements, so the
//! database row lock is the linearization point and several service
//! instances may share one database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::api_key::{
    KeyId, KeyRecord, KeyStore, PageRequest, UseIncrement, UsageLogEntry,
};
use crate::domain::user::UserId;
use crate::domain::DomainError;

const KEY_COLUMNS: &str = "id, value, label, max_uses, used_count, expires_at, revoked, \
                           owner_user_id, created_at, updated_at";

/// PostgreSQL implementation of KeyStore
#[derive(Debug, Clone)]
pub struct PostgresKeyStore {
    pool: PgPool,
}

impl PostgresKeyStore {
    /// Create a new store with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyStore for PostgresKeyStore {
    async fn find_by_value(&self, value: &str) -> Result<Option<KeyRecord>, DomainError> {
        let row = sqlx::query(&format!("SELECT {} FROM api_keys WHERE value = $1", KEY_COLUMNS))
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                DomainError::store_unavailable(format!("Failed to look up API key: {}", e))
            })?;

        row.as_ref().map(row_to_key).transpose()
    }

    async fn find_by_id(&self, id: &KeyId) -> Result<Option<KeyRecord>, DomainError> {
        let row = sqlx::query(&format!("SELECT {} FROM api_keys WHERE id = $1", KEY_COLUMNS))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::store_unavailable(format!("Failed to get API key: {}", e)))?;

        row.as_ref().map(row_to_key).transpose()
    }

    async fn create(&self, record: KeyRecord) -> Result<KeyRecord, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO api_keys (id, value, label, max_uses, used_count, expires_at,
                                  revoked, owner_user_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(record.id().as_uuid())
        .bind(record.value())
        .bind(record.label())
        .bind(record.max_uses())
        .bind(record.used_count())
        .bind(record.expires_at())
        .bind(record.is_revoked())
        .bind(record.owner_user_id().map(|u| *u.as_uuid()))
        .bind(record.created_at())
        .bind(record.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();

            if msg.contains("duplicate key") || msg.contains("unique constraint") {
                DomainError::conflict(format!("API key '{}' already exists", record.id()))
            } else if msg.contains("foreign key") {
                DomainError::validation(format!(
                    "Owner user '{}' does not exist",
                    record
                        .owner_user_id()
                        .map(|id| id.to_string())
                        .unwrap_or_default()
                ))
            } else {
                DomainError::store_unavailable(format!("Failed to create API key: {}", e))
            }
        })?;

        Ok(record)
    }

    async fn increment_uses(
        &self,
        id: &KeyId,
        now: DateTime<Utc>,
    ) -> Result<UseIncrement, DomainError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE api_keys
            SET used_count = used_count + 1, updated_at = $2
            WHERE id = $1
              AND NOT revoked
              AND (expires_at IS NULL OR expires_at > $2)
              AND (max_uses < 0 OR used_count < max_uses)
            RETURNING {}
            "#,
            KEY_COLUMNS
        ))
        .bind(id.as_uuid())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::store_unavailable(format!("Failed to record API key use: {}", e))
        })?;

        if let Some(row) = row {
            return Ok(UseIncrement::Consumed(row_to_key(&row)?));
        }

        // Nothing matched: report why from the current row
        let current = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("API key '{}' not found", id)))?;

        let usability = current.usability(now);
        if usability.is_usable() {
            return Err(DomainError::internal(format!(
                "API key '{}' rejected by the store but usable on re-read",
                id
            )));
        }

        Ok(UseIncrement::Rejected(usability))
    }

    async fn revoke(&self, id: &KeyId, now: DateTime<Utc>) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "UPDATE api_keys SET revoked = TRUE, updated_at = $2 WHERE id = $1 AND NOT revoked",
        )
        .bind(id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::store_unavailable(format!("Failed to revoke API key: {}", e)))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM api_keys WHERE id = $1)")
            .bind(id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                DomainError::store_unavailable(format!("Failed to check API key: {}", e))
            })?;

        if !exists {
            return Err(DomainError::not_found(format!("API key '{}' not found", id)));
        }

        Ok(false)
    }

    async fn find_all(&self, page: &PageRequest) -> Result<(Vec<KeyRecord>, u64), DomainError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_keys")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::store_unavailable(format!("Failed to count API keys: {}", e)))?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM api_keys ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            KEY_COLUMNS
        ))
        .bind(i64::from(page.page_size()))
        .bind(i64::try_from(page.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::store_unavailable(format!("Failed to list API keys: {}", e)))?;

        let mut keys = Vec::with_capacity(rows.len());

        for row in rows {
            keys.push(row_to_key(&row)?);
        }

        Ok((keys, total.max(0) as u64))
    }

    async fn log_usage(&self, entry: &UsageLogEntry) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO key_usage_logs (key_id, caller_identity, used_at) VALUES ($1, $2, $3)",
        )
        .bind(entry.key_id.as_uuid())
        .bind(&entry.caller_identity)
        .bind(entry.used_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::store_unavailable(format!("Failed to log API key use: {}", e)))?;

        Ok(())
    }

    async fn usage_for(&self, id: &KeyId) -> Result<Vec<UsageLogEntry>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT key_id, caller_identity, used_at
            FROM key_usage_logs
            WHERE key_id = $1
            ORDER BY used_at, id
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            DomainError::store_unavailable(format!("Failed to read API key usage: {}", e))
        })?;

        rows.iter()
            .map(|row| -> Result<UsageLogEntry, DomainError> {
                Ok(UsageLogEntry::new(
                    KeyId::from_uuid(get(row, "key_id")?),
                    get::<String>(row, "caller_identity")?,
                    get(row, "used_at")?,
                ))
            })
            .collect()
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, DomainError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column).map_err(|e| {
        DomainError::store_unavailable(format!("Invalid '{}' column in database: {}", column, e))
    })
}

fn row_to_key(row: &PgRow) -> Result<KeyRecord, DomainError> {
    let owner: Option<Uuid> = get(row, "owner_user_id")?;

    Ok(KeyRecord::restore(
        KeyId::from_uuid(get(row, "id")?),
        get(row, "value")?,
        get(row, "label")?,
        get(row, "max_uses")?,
        get(row, "used_count")?,
        get(row, "expires_at")?,
        get(row, "revoked")?,
        owner.map(UserId::from_uuid),
        get(row, "created_at")?,
        get(row, "updated_at")?,
    ))
}
