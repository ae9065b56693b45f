//! 基础设施资源管理
//!
//! 按配置选择存储后端并创建远端数据源

use std::sync::Arc;
use std::time::Duration;

use postal_adapter_memory::InMemoryPostalCodeStore;
use postal_adapter_postgres::{
    MigrationManager, MigrationResult, PostgresConfig, PostgresPostalCodeStore, close_pool,
    create_pool, postal_migrations,
};
use postal_adapter_redis::{RedisPostalCodeStore, create_connection_manager};
use postal_adapter_zippopotam::{ZippopotamClient, ZippopotamConfig};
use postal_common::{RetryConfig, is_retryable_error, with_conditional_retry};
use postal_config::{AppConfig, StorageBackend};
use postal_errors::{AppError, AppResult};
use postal_ports::{PostalCodeSource, PostalCodeStore};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::info;

/// 连接失败是否值得重试（配置错误不重试）
fn is_retryable_connect_error(error: &AppError) -> bool {
    match error {
        AppError::Database(msg) | AppError::ExternalService(msg) => is_retryable_error(msg),
        _ => false,
    }
}

/// 基础设施资源容器
pub struct Infrastructure {
    config: AppConfig,
    store: Arc<dyn PostalCodeStore>,
    source: Arc<ZippopotamClient>,
    /// 仅 postgres 后端持有
    postgres_pool: Option<PgPool>,
}

impl Infrastructure {
    /// 从配置创建基础设施资源（连接带重试）
    pub async fn from_config(config: AppConfig) -> AppResult<Self> {
        let retry_config = RetryConfig::new(5, Duration::from_millis(500), Duration::from_secs(5));

        let (store, postgres_pool): (Arc<dyn PostalCodeStore>, Option<PgPool>) =
            match config.storage.backend {
                StorageBackend::Postgres => {
                    let url = config
                        .database
                        .connection_url()
                        .map_err(|e| AppError::configuration(e.to_string()))?;
                    let pg_config = Self::build_postgres_config(&config, url.expose_secret());

                    let pool = with_conditional_retry(
                        &retry_config,
                        "PostgreSQL connection",
                        || create_pool(&pg_config),
                        is_retryable_connect_error,
                    )
                    .await?;
                    (
                        Arc::new(PostgresPostalCodeStore::new(pool.clone())),
                        Some(pool),
                    )
                }
                StorageBackend::Redis => {
                    let redis = config.redis.as_ref().ok_or_else(|| {
                        AppError::configuration("storage.backend is redis but redis.url is not set")
                    })?;
                    let url = redis.url.expose_secret().clone();

                    let conn = with_conditional_retry(
                        &retry_config,
                        "Redis connection",
                        || create_connection_manager(&url),
                        is_retryable_connect_error,
                    )
                    .await?;
                    (Arc::new(RedisPostalCodeStore::new(conn)), None)
                }
                StorageBackend::Memory => {
                    info!("Using in-memory storage, data is lost on exit");
                    (Arc::new(InMemoryPostalCodeStore::new()), None)
                }
            };

        let source = Arc::new(ZippopotamClient::new(Self::build_zippopotam_config(
            &config,
        ))?);

        info!(
            backend = store.backend(),
            source = source.name(),
            "Infrastructure created"
        );

        Ok(Self {
            config,
            store,
            source,
            postgres_pool,
        })
    }

    fn build_postgres_config(config: &AppConfig, url: &str) -> PostgresConfig {
        let db = &config.database;
        PostgresConfig::new(url)
            .with_pool(db.min_connections, db.max_connections)
            .with_acquire_timeout(Duration::from_secs(db.acquire_timeout_secs))
            .with_idle_timeout(Duration::from_secs(db.idle_timeout_secs))
            .with_max_lifetime(Duration::from_secs(db.max_lifetime_secs))
            .with_application_name(&config.app_name)
    }

    fn build_zippopotam_config(config: &AppConfig) -> ZippopotamConfig {
        let remote = &config.remote;
        ZippopotamConfig::new(&remote.base_url)
            .with_country(&remote.country)
            .with_request_timeout(Duration::from_secs(remote.request_timeout_secs))
            .with_retry(RetryConfig::from_millis(
                remote.retry_max_attempts,
                remote.retry_initial_delay_ms,
                remote.retry_max_delay_ms,
            ))
    }

    /// 显式的初始化步骤：按配置执行迁移并检查存储可用
    pub async fn initialize(&self) -> AppResult<()> {
        if self.postgres_pool.is_some() && self.config.database.auto_migrate {
            self.migrate().await?;
        }
        self.store.health_check().await?;
        Ok(())
    }

    /// 执行数据库迁移，非 postgres 后端无需迁移
    pub async fn migrate(&self) -> AppResult<MigrationResult> {
        let Some(pool) = &self.postgres_pool else {
            info!(backend = self.store.backend(), "Backend has no schema, skipping migrations");
            return Ok(MigrationResult::default());
        };

        let result = MigrationManager::new(pool.clone())
            .migrate(&postal_migrations())
            .await?
            .into_result()?;
        info!(
            applied = result.applied_count(),
            skipped = result.skipped.len(),
            "Migrations finished"
        );
        Ok(result)
    }

    /// 释放连接资源，所有退出路径都应调用
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.postgres_pool {
            close_pool(pool).await;
        }
        info!("Infrastructure shut down");
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn PostalCodeStore> {
        self.store.clone()
    }

    pub fn source(&self) -> Arc<dyn PostalCodeSource> {
        self.source.clone()
    }

    pub fn postgres_pool(&self) -> Option<&PgPool> {
        self.postgres_pool.as_ref()
    }
}
