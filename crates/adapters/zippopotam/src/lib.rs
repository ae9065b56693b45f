//! postal-adapter-zippopotam - api.zippopotam.us 远端数据源

mod client;
mod config;
mod error;

pub use client::*;
pub use config::*;
pub use error::*;
