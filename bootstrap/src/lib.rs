//! postal-bootstrap - 启动骨架
//!
//! 运行时初始化、基础设施装配与关闭

mod infrastructure;
mod runtime;

pub use infrastructure::*;
pub use runtime::*;
