use anyhow::{Context, Result};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing::info;

const INVENTORY_SCHEMA: &str = include_str!("../migrations/0001_inventory.sql");

pub async fn connect_database(database_url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .context("failed to connect to database")?;

    Ok(pool)
}

/// Idempotent: every statement in the schema is guarded by IF NOT EXISTS or
/// replaces its previous definition.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(INVENTORY_SCHEMA)
        .execute(pool)
        .await
        .context("failed to apply inventory schema")?;
    info!("inventory schema ready");
    Ok(())
}
