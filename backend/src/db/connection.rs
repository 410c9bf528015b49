use crate::config::Config;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_pool_size)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout))
        .connect(&config.database_url)
        .await?;

    tracing::info!(
        "Database connection pool created (size: {})",
        config.database_pool_size
    );
    Ok(pool)
}
