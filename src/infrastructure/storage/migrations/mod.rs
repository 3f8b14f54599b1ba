//! Database migrations
//!
//! Migrations are embedded in the binary and tracked in a `_migrations`
//! table. Each one is applied together with its bookkeeping row in a single
//! transaction. Migrations only move forward.

use sqlx::postgres::PgPool;
use tracing::info;

use crate::domain::DomainError;

/// PostgreSQL migrator for the embedded migrations
#[derive(Debug, Clone)]
pub struct PostgresMigrator {
    pool: PgPool,
}

impl PostgresMigrator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the migrations table if it doesn't exist
    async fn ensure_migrations_table(&self) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::store_unavailable(format!("Failed to create migrations table: {}", e))
        })?;

        Ok(())
    }

    async fn is_applied(&self, version: i64) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = $1)")
            .bind(version)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                DomainError::store_unavailable(format!("Failed to check migration status: {}", e))
            })
    }

    /// Apply a single migration, returning false when it was already applied
    pub async fn run_migration(&self, migration: &Migration) -> Result<bool, DomainError> {
        self.ensure_migrations_table().await?;

        if self.is_applied(migration.version).await? {
            return Ok(false);
        }

        let failed = |e: sqlx::Error| {
            DomainError::store_unavailable(format!(
                "Failed to run migration {}: {}",
                migration.version, e
            ))
        };

        let mut tx = self.pool.begin().await.map_err(failed)?;

        sqlx::raw_sql(&migration.up)
            .execute(&mut *tx)
            .await
            .map_err(failed)?;

        sqlx::query("INSERT INTO _migrations (version, description) VALUES ($1, $2)")
            .bind(migration.version)
            .bind(&migration.description)
            .execute(&mut *tx)
            .await
            .map_err(failed)?;

        tx.commit().await.map_err(failed)?;

        info!(
            version = migration.version,
            description = %migration.description,
            "Applied migration"
        );

        Ok(true)
    }

    /// Apply every pending migration in version order
    pub async fn run_all(&self, migrations: &[Migration]) -> Result<usize, DomainError> {
        let mut applied = 0;

        for migration in migrations {
            if self.run_migration(migration).await? {
                applied += 1;
            }
        }

        Ok(applied)
    }

    /// Returns the latest applied migration version
    pub async fn current_version(&self) -> Result<Option<i64>, DomainError> {
        self.ensure_migrations_table().await?;

        sqlx::query_scalar("SELECT MAX(version) FROM _migrations")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                DomainError::store_unavailable(format!("Failed to get migration version: {}", e))
            })
    }
}

/// Represents a database migration
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: i64,
    pub description: String,
    /// SQL to run when applying the migration; may hold several statements
    pub up: String,
}

impl Migration {
    pub fn new(version: i64, description: impl Into<String>, up: impl Into<String>) -> Self {
        Self {
            version,
            description: description.into(),
            up: up.into(),
        }
    }
}

/// Schema for users, API keys and the usage log
pub fn key_service_migrations() -> Vec<Migration> {
    vec![
        Migration::new(
            1,
            "Create users table",
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id UUID PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                last_login_at TIMESTAMPTZ
            );
            "#,
        ),
        Migration::new(
            2,
            "Create api_keys table",
            r#"
            CREATE TABLE IF NOT EXISTS api_keys (
                id UUID PRIMARY KEY,
                value TEXT NOT NULL UNIQUE,
                label TEXT NOT NULL DEFAULT '',
                max_uses BIGINT NOT NULL DEFAULT -1,
                used_count BIGINT NOT NULL DEFAULT 0 CHECK (used_count >= 0),
                expires_at TIMESTAMPTZ,
                revoked BOOLEAN NOT NULL DEFAULT FALSE,
                owner_user_id UUID REFERENCES users(id) ON DELETE SET NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_api_keys_created_at ON api_keys(created_at DESC);
            "#,
        ),
        Migration::new(
            3,
            "Create key_usage_logs table",
            r#"
            CREATE TABLE IF NOT EXISTS key_usage_logs (
                id BIGSERIAL PRIMARY KEY,
                key_id UUID NOT NULL REFERENCES api_keys(id) ON DELETE CASCADE,
                caller_identity TEXT NOT NULL,
                used_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_key_usage_logs_key_id ON key_usage_logs(key_id);
            "#,
        ),
    ]
}

/// Runs all pending migrations against the pool
pub async fn run_migrations(pool: &PgPool) -> Result<usize, DomainError> {
    PostgresMigrator::new(pool.clone())
        .run_all(&key_service_migrations())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creation() {
        let migration = Migration::new(1, "Test migration", "CREATE TABLE test");

        assert_eq!(migration.version, 1);
        assert_eq!(migration.description, "Test migration");
        assert_eq!(migration.up, "CREATE TABLE test");
    }

    #[test]
    fn test_migrations_strictly_ascending() {
        let migrations = key_service_migrations();

        assert!(migrations.windows(2).all(|w| w[0].version < w[1].version));
    }

    #[test]
    fn test_tables_created_before_referenced() {
        let migrations = key_service_migrations();
        let position = |table: &str| {
            migrations
                .iter()
                .position(|m| m.up.contains(&format!("CREATE TABLE IF NOT EXISTS {} ", table)))
                .unwrap()
        };

        assert!(position("users") < position("api_keys"));
        assert!(position("api_keys") < position("key_usage_logs"));
    }

    #[test]
    fn test_migrations_have_content() {
        for migration in key_service_migrations() {
            assert!(!migration.description.is_empty());
            assert!(!migration.up.trim().is_empty());
        }
    }

    #[test]
    fn test_migrations_never_drop_tables() {
        for migration in key_service_migrations() {
            assert!(!migration.up.to_uppercase().contains("DROP "));
        }
    }
}
