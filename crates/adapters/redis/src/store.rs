//! Redis 邮编存储
//!
//! 记录以 JSON 保存在 `postal_codes:{code}`，统计保存在哈希
//! `postal_codes_requests_statistics` 中

use async_trait::async_trait;
use postal_domain::{PostalRecord, RequestStatistic};
use postal_errors::StorageError;
use postal_ports::PostalCodeStore;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;

const RECORD_KEY_PREFIX: &str = "postal_codes";
const STATISTICS_KEY: &str = "postal_codes_requests_statistics";

/// Redis 邮编存储
pub struct RedisPostalCodeStore {
    conn: ConnectionManager,
    key_prefix: String,
    statistics_key: String,
}

impl RedisPostalCodeStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            key_prefix: RECORD_KEY_PREFIX.to_string(),
            statistics_key: STATISTICS_KEY.to_string(),
        }
    }

    /// 为所有键加上命名空间（用于测试隔离或多租户部署）
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.key_prefix = format!("{}:{}", namespace, RECORD_KEY_PREFIX);
        self.statistics_key = format!("{}:{}", namespace, STATISTICS_KEY);
        self
    }

    fn record_key(&self, code: &str) -> String {
        format!("{}:{}", self.key_prefix, code)
    }
}

fn redis_error(context: &str, error: redis::RedisError) -> StorageError {
    let message = format!("{}: {}", context, error);
    if error.is_io_error()
        || error.is_connection_refusal()
        || error.is_connection_dropped()
        || error.is_timeout()
    {
        StorageError::connection(message)
    } else {
        StorageError::query(message)
    }
}

fn to_statistic(code: &str, count: i64) -> Result<RequestStatistic, StorageError> {
    let count = u64::try_from(count).map_err(|_| {
        StorageError::serialization(format!("negative request count {} for {}", count, code))
    })?;
    Ok(RequestStatistic::new(code, count))
}

#[async_trait]
impl PostalCodeStore for RedisPostalCodeStore {
    async fn get(&self, code: &str) -> Result<Option<PostalRecord>, StorageError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn
            .get(self.record_key(code))
            .await
            .map_err(|e| redis_error("Redis get failed", e))?;

        value
            .map(|json| {
                serde_json::from_str::<PostalRecord>(&json).map_err(|e| {
                    StorageError::serialization(format!("Stored record for {} is invalid: {}", code, e))
                })
            })
            .transpose()
    }

    async fn upsert(&self, record: &PostalRecord) -> Result<(), StorageError> {
        let json = serde_json::to_string(record)
            .map_err(|e| StorageError::serialization(format!("Failed to encode record: {}", e)))?;

        let mut conn = self.conn.clone();
        let created: Option<String> = redis::cmd("SET")
            .arg(self.record_key(&record.code))
            .arg(json)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(|e| redis_error("Redis set failed", e))?;

        if created.is_none() {
            debug!(code = %record.code, "Postal code already stored, skipping insert");
        }
        Ok(())
    }

    async fn get_statistic(&self, code: &str) -> Result<Option<RequestStatistic>, StorageError> {
        let mut conn = self.conn.clone();
        let count: Option<i64> = conn
            .hget(&self.statistics_key, code)
            .await
            .map_err(|e| redis_error("Redis hget failed", e))?;

        count.map(|count| to_statistic(code, count)).transpose()
    }

    async fn save_statistic(&self, stat: &RequestStatistic) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .hset(&self.statistics_key, &stat.code, stat.request_count)
            .await
            .map_err(|e| redis_error("Redis hset failed", e))?;
        Ok(())
    }

    async fn increment_statistic(&self, code: &str) -> Result<RequestStatistic, StorageError> {
        let mut conn = self.conn.clone();
        let count: i64 = conn
            .hincr(&self.statistics_key, code, 1)
            .await
            .map_err(|e| redis_error("Redis hincrby failed", e))?;

        to_statistic(code, count)
    }

    async fn health_check(&self) -> Result<(), StorageError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| redis_error("Redis health check failed", e))?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::create_connection_manager;

    #[test]
    fn test_response_errors_are_query_errors() {
        let err = redis::RedisError::from((redis::ErrorKind::TypeError, "unexpected reply"));
        assert!(matches!(redis_error("Redis get failed", err), StorageError::Query(_)));
    }

    #[test]
    fn test_io_errors_are_connection_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = redis::RedisError::from(io);
        assert!(matches!(
            redis_error("Redis get failed", err),
            StorageError::Connection(_)
        ));
    }

    async fn live_store(namespace: &str) -> RedisPostalCodeStore {
        let url = std::env::var("REDIS_URL").expect("REDIS_URL must be set");
        let conn = create_connection_manager(&url).await.unwrap();
        RedisPostalCodeStore::new(conn).with_namespace(namespace)
    }

    #[tokio::test]
    #[ignore = "requires a running Redis (REDIS_URL)"]
    async fn test_live_record_and_statistic() {
        let store = live_store("postal-test").await;
        let mut conn = store.conn.clone();
        let _: i64 = conn.del(store.record_key("999002")).await.unwrap();
        let _: i64 = conn.hdel(&store.statistics_key, "999002").await.unwrap();

        let record = PostalRecord {
            code: "999002".to_string(),
            country: "Russia".to_string(),
            country_abbreviation: "RU".to_string(),
            place_name: "Тест".to_string(),
            longitude: 37.6,
            latitude: 55.7,
            state: "Москва".to_string(),
            state_abbreviation: String::new(),
        };
        store.upsert(&record).await.unwrap();

        let mut changed = record.clone();
        changed.place_name = "Другое".to_string();
        store.upsert(&changed).await.unwrap();
        assert_eq!(store.get("999002").await.unwrap(), Some(record));

        assert_eq!(store.increment_statistic("999002").await.unwrap().request_count, 1);
        assert_eq!(store.increment_statistic("999002").await.unwrap().request_count, 2);
        assert_eq!(
            store.get_statistic("999002").await.unwrap(),
            Some(RequestStatistic::new("999002", 2))
        );
    }
}
