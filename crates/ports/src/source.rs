//! 远端数据源端口定义

use async_trait::async_trait;
use postal_domain::RawPostalPayload;
use postal_errors::FetchError;

/// 远端邮编数据源
///
/// 重试策略属于实现方，调用方每次解析最多调用一次 `fetch`
#[async_trait]
pub trait PostalCodeSource: Send + Sync {
    /// 按邮编获取原始数据
    async fn fetch(&self, code: &str) -> Result<RawPostalPayload, FetchError>;

    /// 数据源名称（用于日志）
    fn name(&self) -> &'static str;
}
