//! Migrate command - applies pending PostgreSQL migrations

use clap::Args;
use tracing::info;

use crate::config::AppConfig;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::storage::{connect_pool, run_migrations, PostgresMigrator};

/// Arguments for the migrate command
#[derive(Args, Debug, Clone)]
pub struct MigrateArgs {
    /// Database URL, overriding `storage.database_url`
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
}

/// Apply all pending migrations and report the resulting version
pub async fn run(args: MigrateArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_logging(&config.logging);

    let url = args
        .database_url
        .or_else(|| config.storage.database_url.clone())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| {
            anyhow::anyhow!("A database URL is required: pass --database-url or set storage.database_url")
        })?;

    let pool = connect_pool(&url, config.storage.max_connections).await?;
    let applied = run_migrations(&pool).await?;
    let version = PostgresMigrator::new(pool.clone()).current_version().await?;

    info!(applied, ?version, "Migrations complete");
    pool.close().await;

    Ok(())
}
