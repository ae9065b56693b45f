//! HTTP 错误到 `FetchError` 的映射

use postal_errors::FetchError;
use reqwest::StatusCode;

/// 传输层错误
pub fn fetch_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if error.is_decode() {
        FetchError::decode(error.to_string())
    } else {
        FetchError::network(error.to_string())
    }
}

/// 非成功状态码：5xx、408、429 为瞬时错误，其余 4xx 不重试
pub fn status_error(status: StatusCode) -> FetchError {
    match status {
        StatusCode::NOT_FOUND => FetchError::NotFound,
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            FetchError::network(format!("unexpected HTTP status {}", status))
        }
        s if s.is_client_error() => FetchError::Rejected(s.as_u16()),
        s => FetchError::network(format!("unexpected HTTP status {}", s)),
    }
}
