//! PostgreSQL 迁移管理模块
//!
//! 版本化的迁移记录在 `_migrations` 表中，每个迁移在独立事务内执行

use std::collections::HashSet;

use postal_errors::{AppError, AppResult};
use sqlx::PgPool;
use tracing::{info, warn};

/// 迁移记录
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: chrono::DateTime<chrono::Utc>,
    pub checksum: String,
}

/// 迁移定义
#[derive(Debug, Clone)]
pub struct Migration {
    /// 版本号
    pub version: i64,
    /// 名称
    pub name: String,
    /// 升级 SQL，可包含多条语句
    pub up_sql: String,
    /// 校验和
    pub checksum: String,
}

impl Migration {
    pub fn new(version: i64, name: impl Into<String>, up_sql: impl Into<String>) -> Self {
        let up_sql = up_sql.into();
        let checksum = checksum(&up_sql);
        Self {
            version,
            name: name.into(),
            up_sql,
            checksum,
        }
    }
}

/// FNV-1a 64 位校验和，跨编译器版本保持稳定
fn checksum(sql: &str) -> String {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = sql.bytes().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(PRIME)
    });
    format!("{:016x}", hash)
}

/// 邮编服务的全部迁移
pub fn postal_migrations() -> Vec<Migration> {
    vec![Migration::new(
        1,
        "create_postal_codes",
        r#"
        CREATE TABLE IF NOT EXISTS postal_codes (
            post_code VARCHAR(10) PRIMARY KEY,
            country VARCHAR(60) NOT NULL,
            country_abbreviation VARCHAR(10) NOT NULL,
            place_name VARCHAR(100) NOT NULL,
            longitude DOUBLE PRECISION NOT NULL,
            latitude DOUBLE PRECISION NOT NULL,
            state VARCHAR(100) NOT NULL,
            state_abbreviation VARCHAR(10)
        );

        CREATE TABLE IF NOT EXISTS postal_codes_requests_statistics (
            post_code VARCHAR(10) PRIMARY KEY,
            request_count INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )]
}

/// 迁移管理器
pub struct MigrationManager {
    pool: PgPool,
    table_name: String,
}

impl MigrationManager {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            table_name: "_migrations".to_string(),
        }
    }

    /// 初始化迁移表
    pub async fn init(&self) -> AppResult<()> {
        let create_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                checksum VARCHAR(64) NOT NULL
            )
            "#,
            self.table_name
        );

        sqlx::query(&create_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to create migration table: {}", e)))?;

        Ok(())
    }

    /// 获取已应用的迁移
    pub async fn get_applied_migrations(&self) -> AppResult<Vec<MigrationRecord>> {
        let sql = format!(
            "SELECT version, name, applied_at, checksum FROM {} ORDER BY version ASC",
            self.table_name
        );

        sqlx::query_as::<_, MigrationRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to get migrations: {}", e)))
    }

    /// 应用单个迁移
    pub async fn apply(&self, migration: &Migration) -> AppResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {}", e)))?;

        let check_sql = format!("SELECT version FROM {} WHERE version = $1", self.table_name);
        let existing: Option<(i64,)> = sqlx::query_as(&check_sql)
            .bind(migration.version)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to check migration: {}", e)))?;

        if existing.is_some() {
            warn!(
                version = migration.version,
                name = %migration.name,
                "Migration already applied, skipping"
            );
            return Ok(());
        }

        sqlx::raw_sql(&migration.up_sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::database(format!(
                    "Failed to apply migration {}: {}",
                    migration.version, e
                ))
            })?;

        let insert_sql = format!(
            "INSERT INTO {} (version, name, checksum) VALUES ($1, $2, $3)",
            self.table_name
        );
        sqlx::query(&insert_sql)
            .bind(migration.version)
            .bind(&migration.name)
            .bind(&migration.checksum)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::database(format!("Failed to record migration: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| AppError::database(format!("Failed to commit migration: {}", e)))?;

        info!(
            version = migration.version,
            name = %migration.name,
            "Migration applied successfully"
        );
        Ok(())
    }

    /// 按版本顺序应用所有待处理的迁移，遇到失败即停止
    pub async fn migrate(&self, migrations: &[Migration]) -> AppResult<MigrationResult> {
        self.init().await?;

        let applied = self.get_applied_migrations().await?;
        let applied_versions: HashSet<i64> = applied.iter().map(|m| m.version).collect();

        let mut result = MigrationResult::default();

        let mut sorted: Vec<_> = migrations.iter().collect();
        sorted.sort_by_key(|m| m.version);

        for migration in sorted {
            if applied_versions.contains(&migration.version) {
                let modified = applied
                    .iter()
                    .find(|r| r.version == migration.version)
                    .is_some_and(|r| r.checksum != migration.checksum);
                if modified {
                    result.errors.push(MigrationError {
                        version: migration.version,
                        name: migration.name.clone(),
                        error: "Checksum mismatch - migration has been modified".to_string(),
                    });
                } else {
                    result.skipped.push(migration.version);
                }
                continue;
            }

            if let Err(e) = self.apply(migration).await {
                result.errors.push(MigrationError {
                    version: migration.version,
                    name: migration.name.clone(),
                    error: e.to_string(),
                });
                break;
            }
            result.applied.push(migration.version);
        }

        Ok(result)
    }
}

/// 迁移结果
#[derive(Debug, Clone, Default)]
pub struct MigrationResult {
    pub applied: Vec<i64>,
    pub skipped: Vec<i64>,
    pub errors: Vec<MigrationError>,
}

impl MigrationResult {
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    /// 转换为错误（存在失败的迁移时）
    pub fn into_result(self) -> AppResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let details = self
            .errors
            .iter()
            .map(|e| format!("{} ({}): {}", e.version, e.name, e.error))
            .collect::<Vec<_>>()
            .join("; ");
        Err(AppError::database(format!("Migrations failed: {}", details)))
    }
}

/// 迁移错误
#[derive(Debug, Clone)]
pub struct MigrationError {
    pub version: i64,
    pub name: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        let sql = "CREATE TABLE test (id INT)";
        assert_eq!(
            Migration::new(1, "test", sql).checksum,
            Migration::new(1, "test", sql).checksum
        );
    }

    #[test]
    fn test_checksum_difference() {
        let m1 = Migration::new(1, "test", "CREATE TABLE test1 (id INT)");
        let m2 = Migration::new(1, "test", "CREATE TABLE test2 (id INT)");
        assert_ne!(m1.checksum, m2.checksum);
    }

    #[test]
    fn test_checksum_known_value() {
        // FNV-1a 对空输入返回偏移基数
        assert_eq!(checksum(""), "cbf29ce484222325");
    }

    #[test]
    fn test_postal_migrations_create_both_tables() {
        let migrations = postal_migrations();
        assert_eq!(migrations.len(), 1);
        assert_eq!(migrations[0].version, 1);
        assert!(migrations[0].up_sql.contains("CREATE TABLE IF NOT EXISTS postal_codes ("));
        assert!(
            migrations[0]
                .up_sql
                .contains("CREATE TABLE IF NOT EXISTS postal_codes_requests_statistics")
        );
    }

    #[test]
    fn test_migration_result() {
        let ok = MigrationResult {
            applied: vec![1],
            skipped: vec![],
            errors: vec![],
        };
        assert!(ok.is_success());
        assert_eq!(ok.applied_count(), 1);
        assert!(ok.into_result().is_ok());

        let failed = MigrationResult {
            applied: vec![],
            skipped: vec![],
            errors: vec![MigrationError {
                version: 1,
                name: "create_postal_codes".to_string(),
                error: "Checksum mismatch - migration has been modified".to_string(),
            }],
        };
        let err = failed.into_result().unwrap_err();
        assert!(err.to_string().contains("create_postal_codes"));
    }
}
