//! domain-core - 邮编查询的领域类型
//!
//! 邮编记录、请求统计与远端原始数据，以及它们之间的校验转换

mod payload;
mod record;
mod statistic;

pub use payload::*;
pub use record::*;
pub use statistic::*;
