//! postal-lookup - 邮编查询服务
//!
//! 先查存储，未命中时请求远端并回写（cache-aside）

pub mod application;

pub use application::resolver::{LookupFailurePolicy, PostalCodeResolver, ResolutionSource};
