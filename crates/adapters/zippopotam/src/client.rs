//! Zippopotam HTTP 客户端

use async_trait::async_trait;
use postal_common::with_conditional_retry;
use postal_domain::RawPostalPayload;
use postal_errors::{AppError, AppResult, FetchError};
use postal_ports::PostalCodeSource;
use tracing::debug;

use crate::config::ZippopotamConfig;
use crate::error::{fetch_error, status_error};

/// api.zippopotam.us 客户端
pub struct ZippopotamClient {
    http_client: reqwest::Client,
    config: ZippopotamConfig,
}

impl ZippopotamClient {
    pub fn new(config: ZippopotamConfig) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &ZippopotamConfig {
        &self.config
    }

    /// 单次请求，不重试
    async fn fetch_once(&self, url: &str) -> Result<RawPostalPayload, FetchError> {
        let response = self
            .http_client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(fetch_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        response.json::<RawPostalPayload>().await.map_err(fetch_error)
    }
}

#[async_trait]
impl PostalCodeSource for ZippopotamClient {
    async fn fetch(&self, code: &str) -> Result<RawPostalPayload, FetchError> {
        let url = self.config.lookup_url(code);
        debug!(code = %code, url = %url, "Fetching postal code from zippopotam");

        with_conditional_retry(
            &self.config.retry,
            "zippopotam_fetch",
            || self.fetch_once(&url),
            FetchError::is_transient,
        )
        .await
    }

    fn name(&self) -> &'static str {
        "zippopotam"
    }
}
