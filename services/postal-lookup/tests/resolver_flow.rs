//! 查询流程集成测试（内存存储 + 计数的远端数据源）

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use postal_adapter_memory::InMemoryPostalCodeStore;
use postal_domain::{PostalRecord, RawPlace, RawPostalPayload};
use postal_errors::{FetchError, ResolutionError};
use postal_lookup::{PostalCodeResolver, ResolutionSource};
use postal_ports::{PostalCodeSource, PostalCodeStore};

/// 按邮编返回预置数据的远端
struct FakeSource {
    payloads: HashMap<String, RawPostalPayload>,
    calls: AtomicUsize,
}

impl FakeSource {
    fn new(payloads: impl IntoIterator<Item = RawPostalPayload>) -> Self {
        Self {
            payloads: payloads
                .into_iter()
                .map(|p| (p.post_code.clone(), p))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostalCodeSource for FakeSource {
    async fn fetch(&self, code: &str) -> Result<RawPostalPayload, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.get(code).cloned().ok_or(FetchError::NotFound)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

fn payload(code: &str, place_name: &str, longitude: f64, latitude: f64) -> RawPostalPayload {
    RawPostalPayload {
        post_code: code.to_string(),
        country: "Russia".to_string(),
        country_abbreviation: "RU".to_string(),
        places: vec![RawPlace {
            place_name: place_name.to_string(),
            longitude,
            latitude,
            state: "Брянская Область".to_string(),
            state_abbreviation: String::new(),
        }],
    }
}

#[tokio::test]
async fn test_miss_then_hit() {
    let store = Arc::new(InMemoryPostalCodeStore::new());
    let source = Arc::new(FakeSource::new([payload("241014", "Брянск 14", 76.9133, 48.1699)]));
    let resolver = PostalCodeResolver::new(store.clone(), source.clone());

    let (fetched, origin) = resolver.resolve_with_source("241014").await.unwrap();
    assert_eq!(origin, ResolutionSource::Remote);
    assert_eq!(store.request_count("241014"), Some(1));

    let (cached, origin) = resolver.resolve_with_source("241014").await.unwrap();
    assert_eq!(origin, ResolutionSource::Storage);
    assert_eq!(cached, fetched);
    assert_eq!(store.request_count("241014"), Some(2));
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_stored_record_matches_fetched_fields() {
    let store = Arc::new(InMemoryPostalCodeStore::new());
    let source = Arc::new(FakeSource::new([payload("241014", "Брянск 14", 76.9133, 48.1699)]));
    let resolver = PostalCodeResolver::new(store.clone(), source);

    let record = resolver.resolve("241014").await.unwrap();
    let stored = store.get("241014").await.unwrap().unwrap();

    assert_eq!(stored, record);
    assert_eq!(stored.country, "Russia");
    assert_eq!(stored.country_abbreviation, "RU");
    assert_eq!(stored.place_name, "Брянск 14");
    assert_eq!(stored.longitude, 76.9133);
    assert_eq!(stored.latitude, 48.1699);
    assert_eq!(stored.state, "Брянская Область");
    assert_eq!(stored.state_abbreviation, "");
}

#[tokio::test]
async fn test_pre_seeded_record_never_contacts_remote() {
    let seeded = PostalRecord {
        code: "358001".to_string(),
        country: "Russia".to_string(),
        country_abbreviation: "RU".to_string(),
        place_name: "Элиста 1".to_string(),
        longitude: 44.2558,
        latitude: 46.3078,
        state: "Калмыкия".to_string(),
        state_abbreviation: String::new(),
    };
    let store = Arc::new(InMemoryPostalCodeStore::with_records([seeded.clone()]));
    let source = Arc::new(FakeSource::new([]));
    let resolver = PostalCodeResolver::new(store.clone(), source.clone());

    assert_eq!(resolver.resolve("358001").await.unwrap(), seeded);
    assert_eq!(store.request_count("358001"), Some(1));
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_unknown_code_leaves_storage_untouched() {
    let store = Arc::new(InMemoryPostalCodeStore::new());
    let source = Arc::new(FakeSource::new([]));
    let resolver = PostalCodeResolver::new(store.clone(), source);

    let err = resolver.resolve("000000").await.unwrap_err();

    assert!(matches!(err, ResolutionError::NotFound { ref code } if code == "000000"));
    assert_eq!(store.record_count(), 0);
    assert_eq!(store.request_count("000000"), None);
}

#[tokio::test]
async fn test_concurrent_resolutions_count_every_request() {
    let store = Arc::new(InMemoryPostalCodeStore::new());
    let source = Arc::new(FakeSource::new([payload("241014", "Брянск 14", 76.9133, 48.1699)]));
    let resolver = Arc::new(PostalCodeResolver::new(store.clone(), source.clone()));

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let resolver = resolver.clone();
            tokio::spawn(async move { resolver.resolve("241014").await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.record_count(), 1);
    assert_eq!(store.request_count("241014"), Some(20));
    assert!(source.calls() >= 1);
}

#[tokio::test]
async fn test_works_through_trait_objects() {
    let store: Arc<dyn PostalCodeStore> = Arc::new(InMemoryPostalCodeStore::new());
    let source: Arc<dyn PostalCodeSource> =
        Arc::new(FakeSource::new([payload("241014", "Брянск 14", 76.9133, 48.1699)]));
    let resolver = PostalCodeResolver::new(store.clone(), source);

    resolver.resolve("241014").await.unwrap();
    resolver.resolve("241014").await.unwrap();

    let stat = resolver.statistic("241014").await.unwrap().unwrap();
    assert_eq!(stat.request_count, 2);
}
