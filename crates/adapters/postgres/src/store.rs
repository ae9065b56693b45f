//! PostgreSQL 邮编存储

use async_trait::async_trait;
use postal_domain::{PostalRecord, RequestStatistic};
use postal_errors::StorageError;
use postal_ports::PostalCodeStore;
use sqlx::PgPool;
use tracing::debug;

use crate::error::storage_error;

/// PostgreSQL 邮编存储
///
/// 每次写入都是单条语句，取消时该行要么完整写入要么未写入
pub struct PostgresPostalCodeStore {
    pool: PgPool,
}

impl PostgresPostalCodeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl PostalCodeStore for PostgresPostalCodeStore {
    async fn get(&self, code: &str) -> Result<Option<PostalRecord>, StorageError> {
        let row = sqlx::query_as::<_, PostalCodeRow>(
            r#"
            SELECT post_code, country, country_abbreviation, place_name,
                   longitude, latitude, state, state_abbreviation
            FROM postal_codes
            WHERE post_code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to get postal code", e))?;

        Ok(row.map(Into::into))
    }

    async fn upsert(&self, record: &PostalRecord) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            INSERT INTO postal_codes (
                post_code, country, country_abbreviation, place_name,
                longitude, latitude, state, state_abbreviation
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (post_code) DO NOTHING
            "#,
        )
        .bind(&record.code)
        .bind(&record.country)
        .bind(&record.country_abbreviation)
        .bind(&record.place_name)
        .bind(record.longitude)
        .bind(record.latitude)
        .bind(&record.state)
        .bind(non_empty(&record.state_abbreviation))
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to insert postal code", e))?;

        if result.rows_affected() == 0 {
            debug!(code = %record.code, "Postal code already stored, skipping insert");
        }
        Ok(())
    }

    async fn get_statistic(&self, code: &str) -> Result<Option<RequestStatistic>, StorageError> {
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT request_count::BIGINT
            FROM postal_codes_requests_statistics
            WHERE post_code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to get request statistic", e))?;

        count
            .map(|count| to_statistic(code, count))
            .transpose()
    }

    async fn save_statistic(&self, stat: &RequestStatistic) -> Result<(), StorageError> {
        let count = i32::try_from(stat.request_count).map_err(|_| {
            StorageError::constraint(format!(
                "request count {} does not fit the request_count column",
                stat.request_count
            ))
        })?;

        sqlx::query(
            r#"
            INSERT INTO postal_codes_requests_statistics (post_code, request_count)
            VALUES ($1, $2)
            ON CONFLICT (post_code) DO UPDATE SET request_count = EXCLUDED.request_count
            "#,
        )
        .bind(&stat.code)
        .bind(count)
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to save request statistic", e))?;

        Ok(())
    }

    async fn increment_statistic(&self, code: &str) -> Result<RequestStatistic, StorageError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO postal_codes_requests_statistics (post_code, request_count)
            VALUES ($1, 1)
            ON CONFLICT (post_code) DO UPDATE
                SET request_count = postal_codes_requests_statistics.request_count + 1
            RETURNING request_count::BIGINT
            "#,
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to increment request statistic", e))?;

        to_statistic(code, count)
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("Database health check failed", e))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() { None } else { Some(value) }
}

fn to_statistic(code: &str, count: i64) -> Result<RequestStatistic, StorageError> {
    let count = u64::try_from(count).map_err(|_| {
        StorageError::serialization(format!("negative request count {} for {}", count, code))
    })?;
    Ok(RequestStatistic::new(code, count))
}

#[derive(sqlx::FromRow)]
struct PostalCodeRow {
    post_code: String,
    country: String,
    country_abbreviation: String,
    place_name: String,
    longitude: f64,
    latitude: f64,
    state: String,
    state_abbreviation: Option<String>,
}

impl From<PostalCodeRow> for PostalRecord {
    fn from(row: PostalCodeRow) -> Self {
        Self {
            code: row.post_code,
            country: row.country,
            country_abbreviation: row.country_abbreviation,
            place_name: row.place_name,
            longitude: row.longitude,
            latitude: row.latitude,
            state: row.state,
            state_abbreviation: row.state_abbreviation.unwrap_or_default(),
        }
    }
}
