//! 查询链路错误
//!
//! 存储失败、远端失败与"确实不存在"三者必须可区分

use thiserror::Error;

/// 存储端口错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage connection failed: {0}")]
    Connection(String),

    #[error("storage query failed: {0}")]
    Query(String),

    #[error("storage constraint violated: {0}")]
    Constraint(String),

    #[error("storage serialization failed: {0}")]
    Serialization(String),
}

impl StorageError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }
}

/// 远端数据源错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("postal code not found at remote source")]
    NotFound,

    #[error("network error: {0}")]
    Network(String),

    #[error("remote source timed out")]
    Timeout,

    #[error("failed to decode remote response: {0}")]
    Decode(String),

    /// 远端拒绝请求（除 408/429 外的 4xx），重试无意义
    #[error("remote source rejected the request with HTTP {0}")]
    Rejected(u16),
}

impl FetchError {
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// 是否为可重试的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}

/// `resolve` 的失败结果，均携带失败的邮编
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolutionError {
    #[error("postal code {code} not found")]
    NotFound { code: String },

    #[error("postal code {code} could not be fetched: {source}")]
    SourceUnavailable { code: String, source: FetchError },

    #[error("postal code {code} returned invalid data: {reason}")]
    InvalidPayload { code: String, reason: String },

    #[error("storage failure while resolving {code}: {source}")]
    StorageFailure { code: String, source: StorageError },
}

impl ResolutionError {
    pub fn code(&self) -> &str {
        match self {
            Self::NotFound { code }
            | Self::SourceUnavailable { code, .. }
            | Self::InvalidPayload { code, .. }
            | Self::StorageFailure { code, .. } => code,
        }
    }

    /// 合并视图：远端"不存在"与远端不可用都视为未命中
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::SourceUnavailable { .. })
    }

    /// 指标标签
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::SourceUnavailable { .. } => "source_unavailable",
            Self::InvalidPayload { .. } => "invalid_payload",
            Self::StorageFailure { .. } => "storage_failure",
        }
    }
}
