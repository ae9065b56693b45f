//! 应用层

pub mod resolver;
