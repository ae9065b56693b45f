//! 存储端口定义

use async_trait::async_trait;
use postal_domain::{PostalRecord, RequestStatistic};
use postal_errors::StorageError;

/// 邮编存储端口
///
/// 覆盖 `postal_codes` 与 `postal_codes_requests_statistics` 两张逻辑表。
/// 并发写同一个键时的串行化由具体实现负责。
#[async_trait]
pub trait PostalCodeStore: Send + Sync {
    /// 按邮编查找记录
    async fn get(&self, code: &str) -> Result<Option<PostalRecord>, StorageError>;

    /// 写入记录，已存在同邮编记录时不报错、不重复（insert-if-absent）
    async fn upsert(&self, record: &PostalRecord) -> Result<(), StorageError>;

    /// 按邮编查找请求统计
    async fn get_statistic(&self, code: &str) -> Result<Option<RequestStatistic>, StorageError>;

    /// 保存请求统计（覆盖计数）
    async fn save_statistic(&self, stat: &RequestStatistic) -> Result<(), StorageError>;

    /// 请求计数加一，不存在时以 1 创建，返回新的统计
    ///
    /// 默认实现是先查后写，并发调用之间不是原子的；
    /// 支持单语句递增的后端应覆盖此方法。
    async fn increment_statistic(&self, code: &str) -> Result<RequestStatistic, StorageError> {
        let stat = match self.get_statistic(code).await? {
            Some(existing) => existing.incremented(),
            None => RequestStatistic::first(code),
        };
        self.save_statistic(&stat).await?;
        Ok(stat)
    }

    /// 检查后端是否可用
    async fn health_check(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// 后端名称（用于日志）
    fn backend(&self) -> &'static str;
}
