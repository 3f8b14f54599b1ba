//! Storage infrastructure
//!
//! Backend selection, the Postgres connection pool and schema migrations.

mod factory;
pub mod migrations;

pub use factory::{connect_pool, Stores, StorageType};
pub use migrations::{key_service_migrations, run_migrations, Migration, PostgresMigrator};
