//! Storage factory for runtime backend selection

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::StorageConfig;
use crate::domain::api_key::KeyStore;
use crate::domain::user::UserRepository;
use crate::domain::DomainError;
use crate::infrastructure::api_key::{InMemoryKeyStore, PostgresKeyStore};
use crate::infrastructure::user::{InMemoryUserRepository, PostgresUserRepository};

use super::migrations::run_migrations;

/// Supported storage types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// Process-local storage; state is lost on restart
    InMemory,
    Postgres,
}

impl FromStr for StorageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Ok(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(DomainError::validation(format!(
                "Unknown storage backend '{}'",
                other
            ))),
        }
    }
}

/// Open a Postgres connection pool
pub async fn connect_pool(url: &str, max_connections: u32) -> Result<PgPool, DomainError> {
    PgPoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(Duration::from_secs(30))
        .connect(url)
        .await
        .map_err(|e| DomainError::store_unavailable(format!("Failed to connect to database: {}", e)))
}

/// The stores backing the services
#[derive(Debug, Clone)]
pub struct Stores {
    pub keys: Arc<dyn KeyStore>,
    pub users: Arc<dyn UserRepository>,
}

impl Stores {
    /// In-memory stores
    pub fn in_memory() -> Self {
        Self {
            keys: Arc::new(InMemoryKeyStore::new()),
            users: Arc::new(InMemoryUserRepository::new()),
        }
    }

    /// Postgres stores sharing one pool
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            keys: Arc::new(PostgresKeyStore::new(pool.clone())),
            users: Arc::new(PostgresUserRepository::new(pool)),
        }
    }

    /// Build the configured stores, applying pending migrations for Postgres
    pub async fn from_config(config: &StorageConfig) -> Result<Self, DomainError> {
        match config.backend.parse()? {
            StorageType::InMemory => {
                info!("Using in-memory storage");
                Ok(Self::in_memory())
            }
            StorageType::Postgres => {
                let url = config.database_url.as_deref().ok_or_else(|| {
                    DomainError::validation("storage.database_url is required for postgres")
                })?;

                let pool = connect_pool(url, config.max_connections).await?;
                let applied = run_migrations(&pool).await?;

                info!(applied, "Using PostgreSQL storage");
                Ok(Self::postgres(pool))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_from_str() {
        assert_eq!("memory".parse::<StorageType>().unwrap(), StorageType::InMemory);
        assert_eq!("In-Memory".parse::<StorageType>().unwrap(), StorageType::InMemory);
        assert_eq!("postgres".parse::<StorageType>().unwrap(), StorageType::Postgres);
        assert_eq!("pg".parse::<StorageType>().unwrap(), StorageType::Postgres);
        assert!("redis".parse::<StorageType>().is_err());
    }

    #[tokio::test]
    async fn test_from_config_in_memory() {
        let stores = Stores::from_config(&StorageConfig::default()).await.unwrap();
        assert_eq!(stores.users.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_from_config_postgres_without_url() {
        let config = StorageConfig {
            backend: "postgres".to_string(),
            ..Default::default()
        };

        let result = Stores::from_config(&config).await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }
}
