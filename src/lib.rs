//! Persistence Gateway Library
//!
//! A generic persistence layer between typed DAOs and a dynamically resolved set of SQL
//! backends (SQLite, PostgreSQL, MySQL). Session factories are built lazily per connection
//! topology and tenant; DAOs dispatch named operations to mapper registries and wrap writes in
//! a uniform commit/rollback policy.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod mappers;
pub mod models;

pub use config::Config;
pub use error::{GatewayError, GatewayResult};
pub use gateway::{GenericDao, SessionFactoryCache};
