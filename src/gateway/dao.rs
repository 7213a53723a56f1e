//! Typed CRUD façade over a mapper and a connection topology.
//!
//! Every read opens its own auto-commit session; every standalone write runs in its own
//! transaction. The `*_in` variants reuse a session the caller already holds and leave
//! commit/rollback to the caller.
//!
//! The only error a façade method returns is `GatewayError::Configuration`, raised when no
//! session factory can be built. Every other failure is logged and turned into an empty list,
//! a default instance or `false`.

use crate::error::GatewayResult;
use crate::gateway::dispatcher::{Dispatcher, default_instance, rows_affected};
use crate::gateway::entity::Entity;
use crate::gateway::factory_cache::SessionFactoryCache;
use crate::gateway::mapper::{Mapper, Params};
use crate::gateway::session::{FactoryBuilder, Session, SessionFactory, SessionOf};
use crate::gateway::transaction::TransactionalExecutor;
use crate::models::ConnectionTopology;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::error;

pub const SELECT_ALL: &str = "selectAll";
pub const SELECT_BY_ID: &str = "selectById";
pub const INSERT: &str = "insert";
pub const UPDATE: &str = "update";
pub const DELETE: &str = "delete";

/// Data access object for entity `T` through mapper `M` on factories built by `B`.
///
/// ```ignore
/// pub type WidgetDao = GenericDao<Widget, WidgetMapper, SqlFactoryBuilder>;
///
/// let dao = WidgetDao::tenant_family_a(cache.clone(), "acme");
/// let widgets = dao.select_all().await?;
/// ```
pub struct GenericDao<T, M, B: FactoryBuilder> {
    cache: Arc<SessionFactoryCache<B>>,
    topology: ConnectionTopology,
    tenant: String,
    dispatcher: Dispatcher<SessionOf<B>>,
    executor: TransactionalExecutor<SessionOf<B>>,
    _marker: PhantomData<fn() -> (T, M)>,
}

impl<T, M, B> GenericDao<T, M, B>
where
    T: Entity,
    B: FactoryBuilder,
    M: Mapper<SessionOf<B>>,
{
    pub fn new(
        cache: Arc<SessionFactoryCache<B>>,
        topology: ConnectionTopology,
        tenant: impl Into<String>,
    ) -> Self {
        let dispatcher = Dispatcher::new(M::registry());
        Self {
            cache,
            topology,
            tenant: tenant.into(),
            executor: TransactionalExecutor::new(dispatcher.clone()),
            dispatcher,
            _marker: PhantomData,
        }
    }

    pub fn single(cache: Arc<SessionFactoryCache<B>>) -> Self {
        Self::new(cache, ConnectionTopology::Single, "")
    }

    pub fn tenant_family_a(cache: Arc<SessionFactoryCache<B>>, tenant: impl Into<String>) -> Self {
        Self::new(cache, ConnectionTopology::TenantFamilyA, tenant)
    }

    pub fn tenant_family_b(cache: Arc<SessionFactoryCache<B>>, tenant: impl Into<String>) -> Self {
        Self::new(cache, ConnectionTopology::TenantFamilyB, tenant)
    }

    pub fn topology(&self) -> ConnectionTopology {
        self.topology
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Point this DAO at another tenant. Takes effect on the next call.
    pub fn set_tenant(&mut self, tenant: impl Into<String>) {
        self.tenant = tenant.into();
    }

    pub fn dispatcher(&self) -> &Dispatcher<SessionOf<B>> {
        &self.dispatcher
    }

    /// The session factory for this DAO's topology and tenant.
    pub async fn factory(&self) -> GatewayResult<Arc<B::Factory>> {
        self.cache.get_factory(self.topology, &self.tenant).await
    }

    /// Open a session for caller-managed work with the `*_in` methods.
    pub async fn open_session(&self, auto_commit: bool) -> GatewayResult<SessionOf<B>> {
        self.factory().await?.open_session(auto_commit).await
    }

    // ---- generic operations ----

    /// Run any list operation of the mapper.
    pub async fn query_list(&self, operation: &str, params: Params) -> GatewayResult<Vec<T>> {
        let factory = self.factory().await?;
        let Some(mut session) = self.open_read_session(&*factory, operation).await else {
            return Ok(Vec::new());
        };
        let items = self
            .dispatcher
            .query_list(&mut session, operation, params)
            .await;
        session.close().await;
        Ok(items)
    }

    /// Run any single-object operation of the mapper.
    pub async fn query_object(&self, operation: &str, params: Params) -> GatewayResult<Option<T>> {
        let factory = self.factory().await?;
        let Some(mut session) = self.open_read_session(&*factory, operation).await else {
            return Ok(default_instance::<T>(operation));
        };
        let item = self
            .dispatcher
            .query_object(&mut session, operation, params)
            .await;
        session.close().await;
        Ok(item)
    }

    /// Run any mutating operation in its own transaction.
    pub async fn execute_dml(&self, operation: &str, params: Params) -> GatewayResult<bool> {
        let factory = self.factory().await?;
        let outcome = self.executor.execute(&*factory, operation, params).await;
        Ok(rows_affected(&outcome.result))
    }

    /// Run any mutating operation inside the caller's session.
    pub async fn execute_dml_in(
        &self,
        session: &mut SessionOf<B>,
        operation: &str,
        params: Params,
    ) -> bool {
        let result = self
            .dispatcher
            .execute_dml(session, operation, params)
            .await;
        rows_affected(&result)
    }

    // ---- reads ----

    pub async fn select_all(&self) -> GatewayResult<Vec<T>> {
        self.query_list(SELECT_ALL, Params::None).await
    }

    pub async fn select_all_with(&self, params: Map<String, Value>) -> GatewayResult<Vec<T>> {
        self.query_list(SELECT_ALL, Params::keyed(params)).await
    }

    pub async fn select_all_by(&self, args: Vec<Value>) -> GatewayResult<Vec<T>> {
        self.query_list(SELECT_ALL, Params::positional(args)).await
    }

    pub async fn select_by_id(&self, args: Vec<Value>) -> GatewayResult<Option<T>> {
        self.query_object(SELECT_BY_ID, Params::positional(args))
            .await
    }

    pub async fn select_by_id_with(&self, params: Map<String, Value>) -> GatewayResult<Option<T>> {
        self.query_object(SELECT_BY_ID, Params::keyed(params)).await
    }

    pub async fn select_by_id_bean(&self, entity: &T) -> GatewayResult<Option<T>> {
        let Some(params) = bean_params(SELECT_BY_ID, entity) else {
            return Ok(default_instance::<T>(SELECT_BY_ID));
        };
        self.query_object(SELECT_BY_ID, params).await
    }

    // ---- writes ----

    pub async fn insert(&self, entity: &T) -> GatewayResult<bool> {
        self.execute_bean(INSERT, entity).await
    }

    pub async fn insert_in(&self, session: &mut SessionOf<B>, entity: &T) -> bool {
        self.execute_bean_in(session, INSERT, entity).await
    }

    pub async fn update(&self, entity: &T) -> GatewayResult<bool> {
        self.execute_bean(UPDATE, entity).await
    }

    pub async fn update_in(&self, session: &mut SessionOf<B>, entity: &T) -> bool {
        self.execute_bean_in(session, UPDATE, entity).await
    }

    pub async fn delete(&self, entity: &T) -> GatewayResult<bool> {
        self.execute_bean(DELETE, entity).await
    }

    pub async fn delete_in(&self, session: &mut SessionOf<B>, entity: &T) -> bool {
        self.execute_bean_in(session, DELETE, entity).await
    }

    pub async fn delete_with(&self, params: Map<String, Value>) -> GatewayResult<bool> {
        self.execute_dml(DELETE, Params::keyed(params)).await
    }

    pub async fn delete_with_in(
        &self,
        session: &mut SessionOf<B>,
        params: Map<String, Value>,
    ) -> bool {
        self.execute_dml_in(session, DELETE, Params::keyed(params))
            .await
    }

    async fn execute_bean(&self, operation: &str, entity: &T) -> GatewayResult<bool> {
        // Resolve the factory first so configuration errors still surface.
        let factory = self.factory().await?;
        let Some(params) = bean_params(operation, entity) else {
            return Ok(false);
        };
        let outcome = self.executor.execute(&*factory, operation, params).await;
        Ok(rows_affected(&outcome.result))
    }

    async fn execute_bean_in(
        &self,
        session: &mut SessionOf<B>,
        operation: &str,
        entity: &T,
    ) -> bool {
        match bean_params(operation, entity) {
            Some(params) => self.execute_dml_in(session, operation, params).await,
            None => false,
        }
    }

    async fn open_read_session(
        &self,
        factory: &B::Factory,
        operation: &str,
    ) -> Option<SessionOf<B>> {
        match factory.open_session(true).await {
            Ok(session) => Some(session),
            Err(e) => {
                error!(
                    environment = %factory.environment(),
                    operation = %operation,
                    error = %e,
                    "Cannot open session"
                );
                None
            }
        }
    }
}

fn bean_params<T: Entity>(operation: &str, entity: &T) -> Option<Params> {
    match Params::bean(entity) {
        Ok(params) => Some(params),
        Err(e) => {
            error!(operation = %operation, error = %e, "Cannot serialize entity");
            None
        }
    }
}

impl<T, M, B: FactoryBuilder> std::fmt::Debug for GenericDao<T, M, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericDao")
            .field("entity", &std::any::type_name::<T>())
            .field("topology", &self.topology)
            .field("tenant", &self.tenant)
            .field("mapper", &self.dispatcher.registry().mapper())
            .finish()
    }
}
