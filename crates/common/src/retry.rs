//! 重试工具
//!
//! 远端请求与启动时的连接建立共用同一套退避规则：每次失败后延迟翻倍，
//! 不超过 `max_delay`。是否重试由调用方按错误类型决定。

use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

/// 重试参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// 总尝试次数（含首次），0 按 1 处理
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryConfig {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
        }
    }

    /// 配置文件中的延迟以毫秒给出
    pub fn from_millis(max_attempts: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self::new(
            max_attempts,
            Duration::from_millis(initial_delay_ms),
            Duration::from_millis(max_delay_ms),
        )
    }

    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// 第 `retry` 次重试（从 0 开始）前的等待时间
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// 连接类错误的特征片段（小写）
const TRANSIENT_MARKERS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection closed",
    "broken pipe",
    "timed out",
    "timeout",
    "temporarily unavailable",
    "too many connections",
    "could not connect",
    "no route to host",
    "server closed the connection",
];

/// 只能拿到错误文本时，按文本判断是否为连接类的瞬时错误
pub fn is_retryable_error(message: &str) -> bool {
    let message = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| message.contains(marker))
}

/// 执行 `operation`，失败且 `should_retry` 为真时按退避规则再次执行
///
/// 返回首次成功的结果，或最后一次（或第一个不可重试的）错误
pub async fn with_conditional_retry<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let error = match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        if !should_retry(&error) {
            warn!(operation = operation_name, attempt, error = %error, "Operation failed with non-retryable error");
            return Err(error);
        }
        if attempt >= max_attempts {
            warn!(operation = operation_name, attempt, max_attempts, error = %error, "Operation failed, giving up");
            return Err(error);
        }

        let delay = config.backoff(attempt - 1);
        warn!(
            operation = operation_name,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Operation failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }
}
