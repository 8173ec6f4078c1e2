//! Database adapters (connection pool, schema).

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Points ledger schema, applied idempotently on startup.
pub const SCHEMA: &str = include_str!("../migrations/0001_points_ledger.sql");

/// Open a connection pool against `database_url`.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

/// Create the ledger tables and indexes if they do not exist yet.
pub async fn apply_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    tracing::info!("points ledger schema is up to date");
    Ok(())
}
