//! ports - 抽象 trait 层
//!
//! 查询核心只依赖这里的存储端口与远端数据源端口

mod source;
mod store;

pub use source::*;
pub use store::*;
