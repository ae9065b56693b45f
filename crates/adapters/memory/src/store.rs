//! 内存邮编存储

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use postal_domain::{PostalRecord, RequestStatistic};
use postal_errors::StorageError;
use postal_ports::PostalCodeStore;
use tracing::debug;

/// 内存邮编存储
#[derive(Default)]
pub struct InMemoryPostalCodeStore {
    records: RwLock<HashMap<String, PostalRecord>>,
    statistics: RwLock<HashMap<String, u64>>,
}

impl InMemoryPostalCodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置记录
    pub fn with_records(records: impl IntoIterator<Item = PostalRecord>) -> Self {
        let store = Self::new();
        {
            let mut map = store.records.write();
            for record in records {
                map.entry(record.code.clone()).or_insert(record);
            }
        }
        store
    }

    pub fn record_count(&self) -> usize {
        self.records.read().len()
    }

    pub fn request_count(&self, code: &str) -> Option<u64> {
        self.statistics.read().get(code).copied()
    }
}

#[async_trait]
impl PostalCodeStore for InMemoryPostalCodeStore {
    async fn get(&self, code: &str) -> Result<Option<PostalRecord>, StorageError> {
        Ok(self.records.read().get(code).cloned())
    }

    async fn upsert(&self, record: &PostalRecord) -> Result<(), StorageError> {
        let mut records = self.records.write();
        if records.contains_key(&record.code) {
            debug!(code = %record.code, "Postal code already stored, skipping insert");
            return Ok(());
        }
        records.insert(record.code.clone(), record.clone());
        Ok(())
    }

    async fn get_statistic(&self, code: &str) -> Result<Option<RequestStatistic>, StorageError> {
        Ok(self
            .statistics
            .read()
            .get(code)
            .map(|count| RequestStatistic::new(code, *count)))
    }

    async fn save_statistic(&self, stat: &RequestStatistic) -> Result<(), StorageError> {
        self.statistics
            .write()
            .insert(stat.code.clone(), stat.request_count);
        Ok(())
    }

    async fn increment_statistic(&self, code: &str) -> Result<RequestStatistic, StorageError> {
        // 在同一把写锁内完成读改写
        let mut statistics = self.statistics.write();
        let count = statistics.entry(code.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        Ok(RequestStatistic::new(code, *count))
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(code: &str, place_name: &str) -> PostalRecord {
        PostalRecord {
            code: code.to_string(),
            country: "Russia".to_string(),
            country_abbreviation: "RU".to_string(),
            place_name: place_name.to_string(),
            longitude: 76.9133,
            latitude: 48.1699,
            state: "Брянская Область".to_string(),
            state_abbreviation: String::new(),
        }
    }

    #[tokio::test]
    async fn test_upsert_is_insert_if_absent() {
        let store = InMemoryPostalCodeStore::new();

        store.upsert(&record("241014", "Брянск 14")).await.unwrap();
        store.upsert(&record("241014", "Брянск 14")).await.unwrap();
        store.upsert(&record("241014", "Другое")).await.unwrap();

        assert_eq!(store.record_count(), 1);
        let stored = store.get("241014").await.unwrap().unwrap();
        assert_eq!(stored.place_name, "Брянск 14");
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = InMemoryPostalCodeStore::new();
        let original = record("241014", "Брянск 14");

        store.upsert(&original).await.unwrap();
        assert_eq!(store.get("241014").await.unwrap(), Some(original));
        assert_eq!(store.get("000000").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_increment_statistic() {
        let store = InMemoryPostalCodeStore::new();

        assert_eq!(store.get_statistic("358001").await.unwrap(), None);
        assert_eq!(store.increment_statistic("358001").await.unwrap().request_count, 1);
        assert_eq!(store.increment_statistic("358001").await.unwrap().request_count, 2);
        assert_eq!(
            store.get_statistic("358001").await.unwrap(),
            Some(RequestStatistic::new("358001", 2))
        );
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = Arc::new(InMemoryPostalCodeStore::new());

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.increment_statistic("241014").await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.request_count("241014"), Some(50));
    }
}
