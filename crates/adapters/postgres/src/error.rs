//! sqlx 错误分类

use postal_errors::StorageError;
use sqlx::error::ErrorKind;

/// 将 sqlx 错误转换为存储错误，`context` 描述失败的操作
pub fn storage_error(context: &str, error: sqlx::Error) -> StorageError {
    let message = format!("{}: {}", context, error);

    match &error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StorageError::connection(message),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            StorageError::serialization(message)
        }
        sqlx::Error::Database(db_err) => match db_err.kind() {
            ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => StorageError::constraint(message),
            _ => {
                // 22001: string_data_right_truncation
                // 08xxx: connection_exception
                // 57P01..57P03: 服务端关闭或尚未就绪
                let code = db_err.code();
                match code.as_deref() {
                    Some("22001") => StorageError::constraint(message),
                    Some(c) if c.starts_with("08") => StorageError::connection(message),
                    Some("57P01" | "57P02" | "57P03") => StorageError::connection(message),
                    _ => StorageError::query(message),
                }
            }
        },
        _ => StorageError::query(message),
    }
}
