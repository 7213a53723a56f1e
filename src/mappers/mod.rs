//! Mappers shipped with the gateway.

pub mod app;

pub use app::{AppMapper, DiagnosticReport};
