//! Data models for the persistence gateway.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;
pub mod topology;

// Re-export commonly used types
pub use connection::{DatabaseType, masked_connection_string};
pub use query::QueryParam;
pub use topology::{ConnectionTopology, DIRECT_ENVIRONMENT, FactoryKey, SINGLE_ENVIRONMENT, TenantFamily};
