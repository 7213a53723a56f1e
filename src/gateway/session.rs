//! Backend seams: sessions, the factories that open them, and the builders that create
//! factories from a parsed environment.
//!
//! The real implementation lives in [`crate::db`]; tests plug in in-memory mocks.

use crate::config::EnvironmentConfig;
use crate::error::GatewayResult;
use std::future::Future;

/// A single-use unit of work against one backend connection.
///
/// Sessions opened with `auto_commit = false` hold an open transaction until `commit` or
/// `rollback`. Closing a session that still holds a transaction rolls it back.
pub trait Session: Send + 'static {
    /// Environment the owning factory was built from.
    fn environment(&self) -> &str;

    fn commit(&mut self) -> impl Future<Output = GatewayResult<()>> + Send;

    fn rollback(&mut self) -> impl Future<Output = GatewayResult<()>> + Send;

    /// Release the session. Never fails; problems are logged.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Opens sessions against one configured environment.
pub trait SessionFactory: Send + Sync + 'static {
    type Session: Session;

    fn environment(&self) -> &str;

    fn open_session(
        &self,
        auto_commit: bool,
    ) -> impl Future<Output = GatewayResult<Self::Session>> + Send;

    /// Shut down the underlying pool.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Constructs session factories for the cache.
pub trait FactoryBuilder: Send + Sync + 'static {
    type Factory: SessionFactory;

    fn build(
        &self,
        environment: &EnvironmentConfig,
    ) -> impl Future<Output = GatewayResult<Self::Factory>> + Send;
}

/// Session type produced by a builder's factories.
pub type SessionOf<B> = <<B as FactoryBuilder>::Factory as SessionFactory>::Session;
