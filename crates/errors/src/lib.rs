//! postal-errors - 统一错误处理
//!
//! `AppError` 用于基础设施与启动流程，查询链路使用更细的
//! `StorageError` / `FetchError` / `ResolutionError`

mod resolution;

pub use resolution::*;

use thiserror::Error;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn external_service(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// 转换为进程退出码（sysexits 约定）
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound(_) => 1,
            Self::Validation(_) => 65,
            Self::Configuration(_) => 78,
            Self::Database(_) => 74,
            Self::ExternalService(_) => 69,
            Self::Internal(_) => 70,
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<ResolutionError> for AppError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::NotFound { .. } => Self::NotFound(err.to_string()),
            ResolutionError::SourceUnavailable { .. } => Self::ExternalService(err.to_string()),
            ResolutionError::InvalidPayload { .. } => Self::Validation(err.to_string()),
            ResolutionError::StorageFailure { .. } => Self::Database(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type AppResult<T> = Result<T, AppError>;
