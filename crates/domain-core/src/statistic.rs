//! 请求统计

use serde::{Deserialize, Serialize};

/// 某个邮编被成功解析的次数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStatistic {
    pub code: String,
    pub request_count: u64,
}

impl RequestStatistic {
    pub fn new(code: impl Into<String>, request_count: u64) -> Self {
        Self {
            code: code.into(),
            request_count,
        }
    }

    /// 首次成功解析
    pub fn first(code: impl Into<String>) -> Self {
        Self::new(code, 1)
    }

    /// 计数加一，计数只增不减
    pub fn incremented(&self) -> Self {
        Self::new(self.code.clone(), self.request_count.saturating_add(1))
    }
}
