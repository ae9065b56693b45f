//! 邮编查询服务
//!
//! 流程：查存储 → 命中则计数返回；未命中则请求远端 → 回写 → 计数 → 返回。
//! 每次调用最多写一次记录、一次统计，远端最多调用一次。

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use postal_config::LookupFailureMode;
use postal_domain::{PostalRecord, RequestStatistic};
use postal_errors::{FetchError, ResolutionError, StorageError};
use postal_ports::{PostalCodeSource, PostalCodeStore};
use postal_telemetry::{
    RESOLUTION_DURATION_MS, RESOLUTION_ERRORS_TOTAL, RESOLUTIONS_TOTAL,
    STORAGE_WRITE_FAILURES_TOTAL,
};
use tracing::{debug, info, instrument, warn};

/// 存储查找失败时的处理策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LookupFailurePolicy {
    /// 返回 `StorageFailure`
    #[default]
    Fail,
    /// 按未命中处理并请求远端；远端也失败时仍返回 `StorageFailure`
    FallThrough,
}

impl From<LookupFailureMode> for LookupFailurePolicy {
    fn from(mode: LookupFailureMode) -> Self {
        match mode {
            LookupFailureMode::Fail => Self::Fail,
            LookupFailureMode::FallThrough => Self::FallThrough,
        }
    }
}

/// 记录的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Storage,
    Remote,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Storage => "storage",
            Self::Remote => "remote",
        }
    }
}

/// 邮编查询服务
pub struct PostalCodeResolver<S, R>
where
    S: PostalCodeStore + ?Sized,
    R: PostalCodeSource + ?Sized,
{
    store: Arc<S>,
    source: Arc<R>,
    lookup_failure: LookupFailurePolicy,
}

impl<S, R> PostalCodeResolver<S, R>
where
    S: PostalCodeStore + ?Sized,
    R: PostalCodeSource + ?Sized,
{
    pub fn new(store: Arc<S>, source: Arc<R>) -> Self {
        Self {
            store,
            source,
            lookup_failure: LookupFailurePolicy::default(),
        }
    }

    pub fn with_lookup_failure(mut self, policy: impl Into<LookupFailurePolicy>) -> Self {
        self.lookup_failure = policy.into();
        self
    }

    /// 查询邮编
    pub async fn resolve(&self, code: &str) -> Result<PostalRecord, ResolutionError> {
        self.resolve_with_source(code)
            .await
            .map(|(record, _)| record)
    }

    /// 查询邮编，同时返回记录来源
    #[instrument(skip(self), fields(backend = self.store.backend()))]
    pub async fn resolve_with_source(
        &self,
        code: &str,
    ) -> Result<(PostalRecord, ResolutionSource), ResolutionError> {
        let start = Instant::now();

        let result = self.resolve_internal(code.trim()).await;

        match &result {
            Ok((_, source)) => {
                counter!(RESOLUTIONS_TOTAL, "source" => source.as_str()).increment(1);
            }
            Err(e) => {
                counter!(RESOLUTION_ERRORS_TOTAL, "kind" => e.kind()).increment(1);
            }
        }
        histogram!(RESOLUTION_DURATION_MS).record(start.elapsed().as_secs_f64() * 1000.0);

        result
    }

    async fn resolve_internal(
        &self,
        code: &str,
    ) -> Result<(PostalRecord, ResolutionSource), ResolutionError> {
        // 不校验格式，非法邮编交给远端判定
        if code.is_empty() {
            debug!("Postal code is empty");
            return Err(ResolutionError::NotFound {
                code: code.to_string(),
            });
        }

        // 1. 查存储
        let mut lookup_error = None;
        let found = match self.store.get(code).await {
            Ok(found) => found,
            Err(e) => match self.lookup_failure {
                LookupFailurePolicy::Fail => {
                    return Err(ResolutionError::StorageFailure {
                        code: code.to_string(),
                        source: e,
                    });
                }
                LookupFailurePolicy::FallThrough => {
                    warn!(code = %code, error = %e, "Storage lookup failed, treating as miss");
                    lookup_error = Some(e);
                    None
                }
            },
        };

        if let Some(record) = found {
            debug!(code = %code, "Postal code served from storage");
            self.record_request(code).await;
            return Ok((record, ResolutionSource::Storage));
        }

        // 2. 请求远端
        let payload = match self.source.fetch(code).await {
            Ok(payload) => payload,
            Err(fetch_error) => {
                // 存储已失败时不能把远端失败报告为未找到
                if let Some(storage_error) = lookup_error {
                    return Err(ResolutionError::StorageFailure {
                        code: code.to_string(),
                        source: storage_error,
                    });
                }
                return Err(match fetch_error {
                    FetchError::NotFound => ResolutionError::NotFound {
                        code: code.to_string(),
                    },
                    other => ResolutionError::SourceUnavailable {
                        code: code.to_string(),
                        source: other,
                    },
                });
            }
        };

        if payload.post_code.trim() != code {
            warn!(
                code = %code,
                payload_code = %payload.post_code,
                source = self.source.name(),
                "Remote payload carries a different postal code"
            );
        }

        let record = PostalRecord::from_payload(code, &payload).map_err(|e| {
            ResolutionError::InvalidPayload {
                code: code.to_string(),
                reason: e.to_string(),
            }
        })?;

        // 3. 回写，失败不影响返回
        if let Err(e) = self.store.upsert(&record).await {
            warn!(code = %code, error = %e, "Failed to write back postal code");
            counter!(STORAGE_WRITE_FAILURES_TOTAL, "operation" => "upsert").increment(1);
        }

        // 4. 计数
        self.record_request(code).await;

        info!(code = %code, source = self.source.name(), "Postal code fetched from remote source");
        Ok((record, ResolutionSource::Remote))
    }

    /// 请求计数加一（存在则 +1，不存在则以 1 创建）
    pub async fn increment_statistic(&self, code: &str) -> Result<RequestStatistic, StorageError> {
        self.store.increment_statistic(code.trim()).await
    }

    /// 查询请求统计
    pub async fn statistic(&self, code: &str) -> Result<Option<RequestStatistic>, StorageError> {
        self.store.get_statistic(code.trim()).await
    }

    async fn record_request(&self, code: &str) {
        match self.increment_statistic(code).await {
            Ok(stat) => {
                debug!(code = %code, request_count = stat.request_count, "Request statistic updated");
            }
            Err(e) => {
                warn!(code = %code, error = %e, "Failed to update request statistic");
                counter!(STORAGE_WRITE_FAILURES_TOTAL, "operation" => "statistic").increment(1);
            }
        }
    }
}
