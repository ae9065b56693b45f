//! PostgreSQL 连接管理

use std::str::FromStr;

use postal_errors::{AppError, AppResult};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::info;

use crate::config::PostgresConfig;

/// 创建 PostgreSQL 连接池
pub async fn create_pool(config: &PostgresConfig) -> AppResult<PgPool> {
    let mut options = PgConnectOptions::from_str(&config.url)
        .map_err(|e| AppError::configuration(format!("Invalid database URL: {}", e)))?;
    if let Some(name) = &config.application_name {
        options = options.application_name(name);
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.pool_max)
        .min_connections(config.pool_min)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect_with(options)
        .await
        .map_err(|e| AppError::database(format!("Failed to create pool: {}", e)))?;

    info!(
        pool_min = config.pool_min,
        pool_max = config.pool_max,
        "PostgreSQL connection pool created"
    );
    Ok(pool)
}

/// 关闭连接池，等待已借出的连接归还
pub async fn close_pool(pool: &PgPool) {
    if !pool.is_closed() {
        pool.close().await;
        info!("PostgreSQL connection pool closed");
    }
}
