//! PostgreSQL user repository implementation

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::user::{User, UserId, UserRepository, UserRole};
use crate::domain::DomainError;

/// PostgreSQL implementation of UserRepository
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn get(&self, id: &UserId) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, password_hash, role, created_at, updated_at, last_login_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::store_unavailable(format!("Failed to get user: {}", e)))?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, username, password_hash, role, created_at, updated_at, last_login_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::store_unavailable(format!("Failed to get user by username: {}", e))
        })?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn create(&self, user: User) -> Result<User, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, role, created_at, updated_at,
                               last_login_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(user.id().as_uuid())
        .bind(user.username())
        .bind(user.password_hash())
        .bind(user.role().as_str())
        .bind(user.created_at())
        .bind(user.updated_at())
        .bind(user.last_login_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let msg = e.to_string();

            if msg.contains("duplicate key") || msg.contains("unique constraint") {
                DomainError::conflict(format!("Username '{}' already exists", user.username()))
            } else {
                DomainError::store_unavailable(format!("Failed to create user: {}", e))
            }
        })?;

        Ok(user)
    }

    async fn count(&self) -> Result<usize, DomainError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::store_unavailable(format!("Failed to count users: {}", e)))?;

        Ok(count.max(0) as usize)
    }

    async fn record_login(&self, id: &UserId) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::store_unavailable(format!("Failed to record login: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("User '{}' not found", id)));
        }

        Ok(())
    }
}

fn row_to_user(row: &PgRow) -> Result<User, DomainError> {
    let decode = |e: sqlx::Error| {
        DomainError::store_unavailable(format!("Invalid user row in database: {}", e))
    };

    let role: String = row.try_get("role").map_err(decode)?;

    Ok(User::restore(
        UserId::from_uuid(row.try_get("id").map_err(decode)?),
        row.try_get("username").map_err(decode)?,
        row.try_get("password_hash").map_err(decode)?,
        str_to_role(&role),
        row.try_get("created_at").map_err(decode)?,
        row.try_get("updated_at").map_err(decode)?,
        row.try_get("last_login_at").map_err(decode)?,
    ))
}

/// Unknown stored roles fall back to the least privileged one
fn str_to_role(s: &str) -> UserRole {
    s.parse().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_conversion() {
        assert_eq!(str_to_role("admin"), UserRole::Admin);
        assert_eq!(str_to_role("ADMIN"), UserRole::Admin);
        assert_eq!(str_to_role("user"), UserRole::User);
        assert_eq!(str_to_role("owner"), UserRole::User);
    }
}
