//! postal-adapter-postgres - PostgreSQL 适配器

mod config;
mod connection;
mod error;
mod migration;
mod store;

pub use config::*;
pub use connection::*;
pub use error::*;
pub use migration::*;
pub use store::*;
