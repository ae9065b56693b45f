//! postal-adapter-memory - 进程内存储适配器
//!
//! 用于本地运行与测试，进程退出后数据丢失

mod store;

pub use store::*;
