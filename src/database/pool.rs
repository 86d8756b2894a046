use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config;

/// Errors from pool setup and health checks
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Connect to the application database and run pending migrations.
pub async fn connect() -> Result<PgPool, DbError> {
    let url = std::env::var("DATABASE_URL").map_err(|_| DbError::ConfigMissing("DATABASE_URL"))?;
    let db_config = &config::config().database;

    let pool = PgPoolOptions::new()
        .max_connections(db_config.max_connections)
        .acquire_timeout(Duration::from_secs(db_config.connection_timeout_secs))
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("Connected to database, migrations applied");
    Ok(pool)
}

/// Pings the pool to ensure connectivity
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
