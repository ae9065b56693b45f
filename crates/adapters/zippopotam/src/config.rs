//! Zippopotam 客户端配置

use std::time::Duration;

use postal_common::RetryConfig;

pub const DEFAULT_BASE_URL: &str = "https://api.zippopotam.us";
pub const DEFAULT_COUNTRY: &str = "RU";

/// Zippopotam 客户端配置
#[derive(Debug, Clone)]
pub struct ZippopotamConfig {
    /// 服务地址（不含末尾斜杠）
    pub base_url: String,
    /// 国家代码
    pub country: String,
    /// 单次请求超时
    pub request_timeout: Duration,
    /// 临时故障的重试策略
    pub retry: RetryConfig,
}

impl Default for ZippopotamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            country: DEFAULT_COUNTRY.to_string(),
            request_timeout: Duration::from_secs(10),
            retry: RetryConfig::from_millis(3, 200, 2000),
        }
    }
}

impl ZippopotamConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// 某个邮编的请求地址
    pub fn lookup_url(&self, code: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            urlencoding::encode(&self.country),
            urlencoding::encode(code)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ZippopotamConfig::default();
        assert_eq!(config.base_url, "https://api.zippopotam.us");
        assert_eq!(config.country, "RU");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_lookup_url() {
        let config = ZippopotamConfig::default();
        assert_eq!(
            config.lookup_url("241014"),
            "https://api.zippopotam.us/RU/241014"
        );
    }

    #[test]
    fn test_lookup_url_encodes_code() {
        let config = ZippopotamConfig::new("http://localhost:8080/").with_country("US");
        assert_eq!(
            config.lookup_url("12 3/4"),
            "http://localhost:8080/US/12%203%2F4"
        );
    }
}
